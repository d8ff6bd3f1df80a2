use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub type Row = serde_json::Map<String, serde_json::Value>;

pub const FEE_STATUS_NOT_AVAILABLE: &str = "Not Available";
pub const MODEL_NOT_LOADED: &str = "Model Not Loaded";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Student {
    pub student_id: StudentId,
    pub semester: Option<String>,
    /// Every roster column, `student_id` and `semester` included, as uploaded.
    pub fields: Row,
}

#[derive(Debug, Clone)]
pub struct Roster {
    pub students: Vec<Student>,
    pub has_semester: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcademicRecord {
    pub student_id: StudentId,
    pub score: Option<f64>,
    pub attempt_number: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    Attendance,
    FeeStatus,
    Other(String),
}

impl RecordType {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "attendance" => RecordType::Attendance,
            "fee_status" => RecordType::FeeStatus,
            other => RecordType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    pub student_id: StudentId,
    pub record_type: RecordType,
    pub status: Option<String>,
    pub date: Option<NaiveDateTime>,
    pub semester: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ActivityLog {
    pub records: Vec<ActivityRecord>,
    /// Whether the uploaded activity file had a `semester` column at all.
    pub has_semester: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AcademicSummary {
    pub overall_grade_avg: Option<f64>,
    pub failed_subjects_count: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceSummary {
    pub attendance_percentage: f64,
    pub has_consecutive_absences: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciledStudent {
    #[serde(skip)]
    pub student_id: StudentId,
    #[serde(flatten)]
    pub roster: Row,
    pub overall_grade_avg: f64,
    pub failed_subjects_count: u32,
    pub attendance_percentage: f64,
    pub has_consecutive_absences: bool,
    pub fee_status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RiskPrediction {
    Predicted(String),
    Unavailable,
}

impl RiskPrediction {
    pub fn label(&self) -> &str {
        match self {
            RiskPrediction::Predicted(label) => label,
            RiskPrediction::Unavailable => MODEL_NOT_LOADED,
        }
    }
}

impl From<String> for RiskPrediction {
    fn from(value: String) -> Self {
        if value == MODEL_NOT_LOADED {
            RiskPrediction::Unavailable
        } else {
            RiskPrediction::Predicted(value)
        }
    }
}

impl From<RiskPrediction> for String {
    fn from(value: RiskPrediction) -> Self {
        match value {
            RiskPrediction::Predicted(label) => label,
            RiskPrediction::Unavailable => MODEL_NOT_LOADED.to_string(),
        }
    }
}

impl fmt::Display for RiskPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyzedStudent {
    #[serde(flatten)]
    pub student: ReconciledStudent,
    pub predicted_risk: RiskPrediction,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prediction_serializes_as_plain_label() {
        let values = vec![
            RiskPrediction::Predicted("High".to_string()),
            RiskPrediction::Unavailable,
        ];
        let encoded = serde_json::to_value(&values).unwrap();
        assert_eq!(encoded, json!(["High", "Model Not Loaded"]));

        let decoded: Vec<RiskPrediction> = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn analyzed_student_flattens_roster_fields() {
        let mut roster = Row::new();
        roster.insert("student_id".to_string(), json!(101));
        roster.insert("name".to_string(), json!("Avery Lee"));

        let row = AnalyzedStudent {
            student: ReconciledStudent {
                student_id: StudentId::new("101"),
                roster,
                overall_grade_avg: 71.5,
                failed_subjects_count: 1,
                attendance_percentage: 50.0,
                has_consecutive_absences: false,
                fee_status: "Paid".to_string(),
            },
            predicted_risk: RiskPrediction::Unavailable,
        };

        let encoded = serde_json::to_value(&row).unwrap();
        assert_eq!(
            encoded,
            json!({
                "student_id": 101,
                "name": "Avery Lee",
                "overall_grade_avg": 71.5,
                "failed_subjects_count": 1,
                "attendance_percentage": 50.0,
                "has_consecutive_absences": false,
                "fee_status": "Paid",
                "predicted_risk": "Model Not Loaded"
            })
        );
    }
}
