use std::collections::HashMap;

use crate::models::{ActivityRecord, AttendanceSummary, RecordType, StudentId};

pub const PRESENT: &str = "Present";
pub const ABSENT: &str = "Absent";

/// Length of the absence run that raises the consecutive-absence flag.
pub const ABSENCE_STREAK: usize = 3;

fn group_attendance(records: &[ActivityRecord]) -> HashMap<&StudentId, Vec<&ActivityRecord>> {
    let mut groups: HashMap<&StudentId, Vec<&ActivityRecord>> = HashMap::new();
    for record in records
        .iter()
        .filter(|record| record.record_type == RecordType::Attendance)
    {
        groups.entry(&record.student_id).or_default().push(record);
    }
    groups
}

pub fn attendance_percentage(rows: &[&ActivityRecord]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let present = rows
        .iter()
        .filter(|row| row.status.as_deref() == Some(PRESENT))
        .count();
    100.0 * present as f64 / rows.len() as f64
}

pub fn has_absence_streak(rows: &[&ActivityRecord]) -> bool {
    let mut run = 0;
    for row in rows {
        if row.status.as_deref() == Some(ABSENT) {
            run += 1;
            if run >= ABSENCE_STREAK {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Rows are stably sorted by date, undated first, before the streak scan.
pub fn summarize_attendance(records: &[ActivityRecord]) -> HashMap<StudentId, AttendanceSummary> {
    group_attendance(records)
        .into_iter()
        .map(|(student_id, mut rows)| {
            rows.sort_by_key(|row| row.date);
            let summary = AttendanceSummary {
                attendance_percentage: attendance_percentage(&rows),
                has_consecutive_absences: has_absence_streak(&rows),
            };
            (student_id.clone(), summary)
        })
        .collect()
}
