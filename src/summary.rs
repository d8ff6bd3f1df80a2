use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::models::RiskPrediction;

/// Other columns of an analysis row are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SummaryInput {
    pub predicted_risk: RiskPrediction,
    pub attendance_percentage: f64,
    pub overall_grade_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    pub attendance_percentage: f64,
    pub overall_grade_avg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortSummary {
    pub risk_distribution: BTreeMap<String, usize>,
    pub scatter_data: Vec<ScatterPoint>,
    pub total_students: usize,
    pub average_attendance: f64,
    pub average_grade: f64,
}

pub fn build_summary(rows: &[SummaryInput]) -> Result<CohortSummary> {
    if rows.is_empty() {
        return Err(AnalysisError::EmptyInput);
    }

    let total_students = rows.len();
    let count = total_students as f64;
    let mut risk_distribution = BTreeMap::new();
    let mut average_attendance = 0.0;
    let mut average_grade = 0.0;
    let mut scatter_data = Vec::with_capacity(rows.len());

    for row in rows {
        *risk_distribution
            .entry(row.predicted_risk.label().to_string())
            .or_insert(0) += 1;
        average_attendance += row.attendance_percentage / count;
        average_grade += row.overall_grade_avg / count;
        scatter_data.push(ScatterPoint {
            attendance_percentage: row.attendance_percentage,
            overall_grade_avg: row.overall_grade_avg,
        });
    }

    Ok(CohortSummary {
        risk_distribution,
        scatter_data,
        total_students,
        average_attendance,
        average_grade,
    })
}

pub fn summarize_json(value: serde_json::Value) -> Result<CohortSummary> {
    let rows: Vec<SummaryInput> = serde_json::from_value(value)
        .map_err(|err| AnalysisError::InvalidSummaryInput(err.to_string()))?;
    build_summary(&rows)
}
