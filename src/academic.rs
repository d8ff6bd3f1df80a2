use std::collections::HashMap;

use crate::models::{AcademicRecord, AcademicSummary, StudentId};

#[derive(Default)]
struct Accumulator {
    scores: Vec<f64>,
    failed: u32,
}

/// Divides before summing; finite scores give a finite mean.
fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let count = values.len() as f64;
    Some(values.iter().map(|value| value / count).sum())
}

/// Null scores are left out of the mean.
pub fn summarize_academics(records: &[AcademicRecord]) -> HashMap<StudentId, AcademicSummary> {
    let mut groups: HashMap<&StudentId, Accumulator> = HashMap::new();

    for record in records {
        let entry = groups.entry(&record.student_id).or_default();
        if let Some(score) = record.score {
            entry.scores.push(score);
        }
        if record.attempt_number.is_some_and(|attempt| attempt > 1) {
            entry.failed += 1;
        }
    }

    groups
        .into_iter()
        .map(|(student_id, acc)| {
            (
                student_id.clone(),
                AcademicSummary {
                    overall_grade_avg: mean(&acc.scores),
                    failed_subjects_count: acc.failed,
                },
            )
        })
        .collect()
}
