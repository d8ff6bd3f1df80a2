use std::collections::HashMap;

use crate::models::{
    AcademicSummary, AttendanceSummary, ReconciledStudent, Roster, StudentId,
    FEE_STATUS_NOT_AVAILABLE,
};

pub const DEFAULT_GRADE_AVG: f64 = 0.0;
pub const DEFAULT_ATTENDANCE_PERCENTAGE: f64 = 100.0;

/// Output columns computed here; a roster column of the same name is
/// replaced by the computed value.
const DERIVED_COLUMNS: [&str; 6] = [
    "overall_grade_avg",
    "failed_subjects_count",
    "attendance_percentage",
    "has_consecutive_absences",
    "fee_status",
    "predicted_risk",
];

pub fn round2(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}

#[derive(Debug, Default)]
pub struct Aggregates {
    pub academic: HashMap<StudentId, AcademicSummary>,
    pub attendance: HashMap<StudentId, AttendanceSummary>,
    pub fees: HashMap<StudentId, String>,
}

/// One row per roster student, in roster order.
pub fn reconcile(roster: &Roster, aggregates: &Aggregates) -> Vec<ReconciledStudent> {
    roster
        .students
        .iter()
        .map(|student| {
            let id = &student.student_id;
            let academic = aggregates.academic.get(id);
            let attendance = aggregates.attendance.get(id);

            let mut fields = student.fields.clone();
            for column in DERIVED_COLUMNS {
                fields.shift_remove(column);
            }

            ReconciledStudent {
                student_id: id.clone(),
                roster: fields,
                overall_grade_avg: round2(
                    academic
                        .and_then(|summary| summary.overall_grade_avg)
                        .unwrap_or(DEFAULT_GRADE_AVG),
                ),
                failed_subjects_count: academic
                    .map(|summary| summary.failed_subjects_count)
                    .unwrap_or(0),
                attendance_percentage: round2(
                    attendance
                        .map(|summary| summary.attendance_percentage)
                        .unwrap_or(DEFAULT_ATTENDANCE_PERCENTAGE),
                ),
                has_consecutive_absences: attendance
                    .map(|summary| summary.has_consecutive_absences)
                    .unwrap_or(false),
                fee_status: aggregates
                    .fees
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| FEE_STATUS_NOT_AVAILABLE.to_string()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Row, Student};
    use serde_json::json;

    fn roster(ids: &[&str]) -> Roster {
        Roster {
            students: ids
                .iter()
                .map(|id| {
                    let mut fields = Row::new();
                    fields.insert("student_id".to_string(), json!(id));
                    fields.insert("name".to_string(), json!(format!("Student {id}")));
                    Student {
                        student_id: StudentId::new(*id),
                        semester: None,
                        fields,
                    }
                })
                .collect(),
            has_semester: false,
        }
    }

    #[test]
    fn every_roster_student_appears_once_in_order() {
        for size in [0usize, 1, 7, 40] {
            let ids: Vec<String> = (0..size).map(|n| format!("S{n:03}")).collect();
            let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            let mut aggregates = Aggregates::default();
            aggregates.fees.insert(StudentId::new("ghost"), "Paid".to_string());

            let rows = reconcile(&roster(&id_refs), &aggregates);
            assert_eq!(rows.len(), size);
            for (row, id) in rows.iter().zip(&ids) {
                assert_eq!(row.student_id.as_str(), id);
            }
        }
    }

    #[test]
    fn unmatched_student_gets_defaults() {
        let rows = reconcile(&roster(&["101"]), &Aggregates::default());
        let row = &rows[0];
        assert_eq!(row.overall_grade_avg, 0.0);
        assert_eq!(row.failed_subjects_count, 0);
        assert_eq!(row.attendance_percentage, 100.0);
        assert!(!row.has_consecutive_absences);
        assert_eq!(row.fee_status, "Not Available");
        assert_eq!(row.roster["name"], json!("Student 101"));
    }

    #[test]
    fn joins_and_rounds_aggregates() {
        let id = StudentId::new("101");
        let mut aggregates = Aggregates::default();
        aggregates.academic.insert(
            id.clone(),
            AcademicSummary {
                overall_grade_avg: Some(200.0 / 3.0),
                failed_subjects_count: 2,
            },
        );
        aggregates.attendance.insert(
            id.clone(),
            AttendanceSummary {
                attendance_percentage: 100.0 * 2.0 / 3.0,
                has_consecutive_absences: true,
            },
        );
        aggregates.fees.insert(id, "Overdue".to_string());

        let row = &reconcile(&roster(&["101"]), &aggregates)[0];
        assert_eq!(row.overall_grade_avg, 66.67);
        assert_eq!(row.failed_subjects_count, 2);
        assert_eq!(row.attendance_percentage, 66.67);
        assert!(row.has_consecutive_absences);
        assert_eq!(row.fee_status, "Overdue");
    }

    #[test]
    fn all_null_scores_fall_back_to_default_grade() {
        let id = StudentId::new("101");
        let mut aggregates = Aggregates::default();
        aggregates.academic.insert(
            id,
            AcademicSummary {
                overall_grade_avg: None,
                failed_subjects_count: 1,
            },
        );
        let row = &reconcile(&roster(&["101"]), &aggregates)[0];
        assert_eq!(row.overall_grade_avg, 0.0);
        assert_eq!(row.failed_subjects_count, 1);
    }

    #[test]
    fn rounding_keeps_huge_values_finite() {
        assert_eq!(round2(1e307), 1e307);
        assert_eq!(round2(f64::MAX), f64::MAX);
        assert_eq!(round2(-2.345), -2.35);
        assert_eq!(round2(12.344), 12.34);
    }

    #[test]
    fn computed_columns_replace_roster_columns() {
        let mut roster = roster(&["101"]);
        roster.students[0]
            .fields
            .insert("fee_status".to_string(), json!("stale"));

        let row = &reconcile(&roster, &Aggregates::default())[0];
        assert!(!row.roster.contains_key("fee_status"));
        let encoded = serde_json::to_value(row).unwrap();
        assert_eq!(encoded["fee_status"], json!("Not Available"));
    }
}
