use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{AnalysisError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileRole {
    Students,
    AcademicRecords,
    ActivityRecords,
}

impl FileRole {
    pub const ALL: [FileRole; 3] = [
        FileRole::Students,
        FileRole::AcademicRecords,
        FileRole::ActivityRecords,
    ];

    pub fn token(self) -> &'static str {
        match self {
            FileRole::Students => "students",
            FileRole::AcademicRecords => "academic_records",
            FileRole::ActivityRecords => "activity_records",
        }
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifiedFiles {
    pub students: UploadedFile,
    pub academic_records: UploadedFile,
    pub activity_records: UploadedFile,
}

fn role_for(filename: &str) -> Result<FileRole> {
    let lowered = filename.to_lowercase();
    let mut matched: Option<FileRole> = None;

    for role in FileRole::ALL {
        if !lowered.contains(role.token()) {
            continue;
        }
        if let Some(first) = matched {
            return Err(AnalysisError::AmbiguousFile {
                filename: filename.to_string(),
                first,
                second: role,
            });
        }
        matched = Some(role);
    }

    matched.ok_or_else(|| AnalysisError::UnrecognizedFile {
        filename: filename.to_string(),
    })
}

/// Files are checked in input order; the first offending file is reported.
pub fn classify_files(files: Vec<UploadedFile>) -> Result<ClassifiedFiles> {
    let mut slots: [Option<UploadedFile>; 3] = [None, None, None];

    for file in files {
        let role = role_for(&file.filename)?;
        let slot = &mut slots[role as usize];
        if let Some(existing) = slot {
            return Err(AnalysisError::DuplicateRole {
                role,
                first: existing.filename.clone(),
                second: file.filename,
            });
        }
        debug!(filename = %file.filename, %role, "assigned file role");
        *slot = Some(file);
    }

    let [students, academic_records, activity_records] = slots;
    let missing = |role| AnalysisError::MissingRole { role };

    Ok(ClassifiedFiles {
        students: students.ok_or_else(|| missing(FileRole::Students))?,
        academic_records: academic_records.ok_or_else(|| missing(FileRole::AcademicRecords))?,
        activity_records: activity_records.ok_or_else(|| missing(FileRole::ActivityRecords))?,
    })
}
