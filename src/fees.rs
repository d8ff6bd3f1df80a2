use std::collections::HashMap;

use tracing::{debug, info};

use crate::models::{ActivityLog, ActivityRecord, RecordType, Roster, StudentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePolicy {
    CurrentSemester,
    Latest,
}

impl FeePolicy {
    /// Semester scoping needs a `semester` column in both files.
    pub fn for_sources(roster: &Roster, activity: &ActivityLog) -> Self {
        if roster.has_semester && activity.has_semester {
            FeePolicy::CurrentSemester
        } else {
            FeePolicy::Latest
        }
    }
}

/// Keeps `candidate` when it is at least as recent as `current`; undated
/// records lose to dated ones, and later input rows win ties.
fn is_newer(candidate: &ActivityRecord, current: &ActivityRecord) -> bool {
    candidate.date >= current.date
}

/// Latest fee status per student under `policy`. Records without a status
/// are skipped, so a blank latest row leaves the previous status in place.
/// Students without a qualifying record are absent from the result.
pub fn resolve_fee_status(
    roster: &Roster,
    activity: &ActivityLog,
    policy: FeePolicy,
) -> HashMap<StudentId, String> {
    let current_semester: HashMap<&StudentId, Option<&str>> = roster
        .students
        .iter()
        .map(|student| (&student.student_id, student.semester.as_deref()))
        .collect();

    let qualifies = |record: &ActivityRecord| match policy {
        FeePolicy::Latest => true,
        FeePolicy::CurrentSemester => {
            match (
                current_semester.get(&record.student_id).copied().flatten(),
                record.semester.as_deref(),
            ) {
                (Some(current), Some(billed)) => current == billed,
                _ => false,
            }
        }
    };

    let mut latest: HashMap<&StudentId, &ActivityRecord> = HashMap::new();
    let mut considered = 0usize;
    for record in activity
        .records
        .iter()
        .filter(|record| record.record_type == RecordType::FeeStatus)
        .filter(|record| record.status.is_some())
        .filter(|record| qualifies(*record))
    {
        considered += 1;
        latest
            .entry(&record.student_id)
            .and_modify(|current| {
                if is_newer(record, *current) {
                    *current = record;
                }
            })
            .or_insert(record);
    }

    debug!(?policy, considered, students = latest.len(), "resolved fee records");
    if policy == FeePolicy::CurrentSemester {
        info!("fee status scoped to each student's current semester");
    }

    latest
        .into_iter()
        .filter_map(|(student_id, record)| {
            record
                .status
                .clone()
                .map(|status| (student_id.clone(), status))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Row, Student};
    use chrono::{NaiveDate, NaiveDateTime};

    fn day(month: u32, d: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2026, month, d).and_then(|date| date.and_hms_opt(0, 0, 0))
    }

    fn roster(students: &[(&str, Option<&str>)], has_semester: bool) -> Roster {
        Roster {
            students: students
                .iter()
                .map(|(id, semester)| Student {
                    student_id: StudentId::new(*id),
                    semester: semester.map(str::to_string),
                    fields: Row::new(),
                })
                .collect(),
            has_semester,
        }
    }

    fn fee(
        student: &str,
        status: &str,
        date: Option<NaiveDateTime>,
        semester: Option<&str>,
    ) -> ActivityRecord {
        ActivityRecord {
            student_id: StudentId::new(student),
            record_type: RecordType::FeeStatus,
            status: Some(status.to_string()),
            date,
            semester: semester.map(str::to_string),
        }
    }

    fn log(records: Vec<ActivityRecord>, has_semester: bool) -> ActivityLog {
        ActivityLog {
            records,
            has_semester,
        }
    }

    #[test]
    fn current_semester_beats_globally_latest() {
        let roster = roster(&[("101", Some("2"))], true);
        let activity = log(
            vec![
                fee("101", "Paid", day(1, 10), Some("1")),
                fee("101", "Due", day(2, 1), Some("2")),
                fee("101", "Overdue", day(3, 1), Some("2")),
                fee("101", "Paid", day(9, 1), Some("3")),
            ],
            true,
        );

        let policy = FeePolicy::for_sources(&roster, &activity);
        assert_eq!(policy, FeePolicy::CurrentSemester);
        let resolved = resolve_fee_status(&roster, &activity, policy);
        assert_eq!(resolved[&StudentId::new("101")], "Overdue");
    }

    #[test]
    fn falls_back_to_latest_without_semester_column() {
        let roster = roster(&[("101", Some("2"))], true);
        let activity = log(
            vec![
                fee("101", "Overdue", day(5, 1), None),
                fee("101", "Paid", day(2, 1), None),
            ],
            false,
        );

        let policy = FeePolicy::for_sources(&roster, &activity);
        assert_eq!(policy, FeePolicy::Latest);
        let resolved = resolve_fee_status(&roster, &activity, policy);
        assert_eq!(resolved[&StudentId::new("101")], "Overdue");
    }

    #[test]
    fn roster_without_semesters_uses_latest() {
        let roster = roster(&[("101", None)], false);
        let activity = log(vec![fee("101", "Paid", day(1, 1), Some("1"))], true);
        assert_eq!(FeePolicy::for_sources(&roster, &activity), FeePolicy::Latest);
    }

    #[test]
    fn scoped_policy_drops_unmatched_records() {
        let roster = roster(&[("101", Some("2")), ("102", None)], true);
        let activity = log(
            vec![
                fee("101", "Paid", day(1, 1), Some("1")),
                fee("102", "Paid", day(1, 1), Some("2")),
                fee("999", "Due", day(1, 1), Some("2")),
            ],
            true,
        );

        let resolved = resolve_fee_status(&roster, &activity, FeePolicy::CurrentSemester);
        assert!(resolved.is_empty());
    }

    #[test]
    fn later_row_wins_on_equal_dates_and_dated_beats_undated() {
        let roster = roster(&[("101", None)], false);
        let activity = log(
            vec![
                fee("101", "Due", day(4, 1), None),
                fee("101", "Paid", day(4, 1), None),
                fee("101", "Waived", None, None),
            ],
            false,
        );

        let resolved = resolve_fee_status(&roster, &activity, FeePolicy::Latest);
        assert_eq!(resolved[&StudentId::new("101")], "Paid");
    }

    fn blank_fee(
        student: &str,
        date: Option<NaiveDateTime>,
        semester: Option<&str>,
    ) -> ActivityRecord {
        ActivityRecord {
            status: None,
            ..fee(student, "", date, semester)
        }
    }

    #[test]
    fn blank_latest_status_keeps_previous_status() {
        let roster = roster(&[("101", Some("2")), ("102", None)], true);
        let activity = log(
            vec![
                fee("101", "Paid", day(1, 1), Some("2")),
                blank_fee("101", day(2, 1), Some("2")),
                blank_fee("102", day(2, 1), Some("2")),
            ],
            true,
        );

        let resolved = resolve_fee_status(&roster, &activity, FeePolicy::Latest);
        assert_eq!(resolved[&StudentId::new("101")], "Paid");
        assert!(!resolved.contains_key(&StudentId::new("102")));

        let scoped = resolve_fee_status(&roster, &activity, FeePolicy::CurrentSemester);
        assert_eq!(scoped[&StudentId::new("101")], "Paid");
    }
}
