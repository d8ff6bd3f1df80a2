use serde::Serialize;
use thiserror::Error;

use crate::files::FileRole;

/// `Unexpected` keeps its cause for logging but shows a generic message.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unsupported file type: {filename}")]
    UnsupportedFileType { filename: String },

    #[error("no uploaded file matched the `{role}` role, check file names")]
    MissingRole { role: FileRole },

    #[error("file `{filename}` matches more than one role ({first}, {second})")]
    AmbiguousFile {
        filename: String,
        first: FileRole,
        second: FileRole,
    },

    #[error("file `{filename}` does not match any role (expected `students`, `academic_records` or `activity_records` in the name)")]
    UnrecognizedFile { filename: String },

    #[error("both `{first}` and `{second}` match the `{role}` role")]
    DuplicateRole {
        role: FileRole,
        first: String,
        second: String,
    },

    #[error("{role} file is missing required column `{column}`")]
    MissingColumn { role: FileRole, column: String },

    #[error("{role} file row {row}: {reason}")]
    InvalidValue {
        role: FileRole,
        row: usize,
        reason: String,
    },

    #[error("summary input is not a list of analysis rows: {0}")]
    InvalidSummaryInput(String),

    #[error("no student data provided")]
    EmptyInput,

    #[error("an unexpected error occurred while processing the data")]
    Unexpected(#[source] anyhow::Error),
}

impl AnalysisError {
    pub fn unexpected(err: impl Into<anyhow::Error>) -> Self {
        AnalysisError::Unexpected(err.into())
    }

    pub fn invalid_value(role: FileRole, row: usize, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidValue {
            role,
            row,
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::UnsupportedFileType { .. } => "unsupported_file_type",
            AnalysisError::MissingRole { .. } => "missing_role",
            AnalysisError::AmbiguousFile { .. } => "ambiguous_file",
            AnalysisError::UnrecognizedFile { .. } => "unrecognized_file",
            AnalysisError::DuplicateRole { .. } => "duplicate_role",
            AnalysisError::MissingColumn { .. } => "missing_column",
            AnalysisError::InvalidValue { .. } => "invalid_value",
            AnalysisError::InvalidSummaryInput(_) => "invalid_summary_input",
            AnalysisError::EmptyInput => "empty_input",
            AnalysisError::Unexpected(_) => "unexpected_error",
        }
    }

    pub fn is_client_error(&self) -> bool {
        !matches!(self, AnalysisError::Unexpected(_))
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.code(),
            detail: self.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub detail: String,
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
