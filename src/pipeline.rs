use std::sync::Arc;

use tracing::{debug, error, info, info_span};
use uuid::Uuid;

use crate::academic::summarize_academics;
use crate::attendance::summarize_attendance;
use crate::error::{AnalysisError, Result};
use crate::fees::{resolve_fee_status, FeePolicy};
use crate::files::{classify_files, UploadedFile};
use crate::models::AnalyzedStudent;
use crate::predictor::RiskPredictor;
use crate::reader::{self, SpreadsheetFormat};
use crate::reconcile::{reconcile, Aggregates};

#[derive(Clone)]
pub struct CohortAnalyzer {
    predictor: Arc<RiskPredictor>,
}

impl CohortAnalyzer {
    pub fn new(predictor: Arc<RiskPredictor>) -> Self {
        Self { predictor }
    }

    /// Internal failures are logged here in full and surface only as
    /// [`AnalysisError::Unexpected`].
    pub fn analyze(&self, files: Vec<UploadedFile>) -> Result<Vec<AnalyzedStudent>> {
        let run_id = Uuid::new_v4();
        let span = info_span!("analysis", %run_id);
        let _guard = span.enter();

        info!(
            files = files.len(),
            model_loaded = self.predictor.is_available(),
            "starting analysis"
        );
        let result = self.run(files);
        match &result {
            Ok(rows) => info!(students = rows.len(), "analysis complete"),
            Err(AnalysisError::Unexpected(cause)) => error!(error = ?cause, "analysis failed"),
            Err(err) => info!(code = err.code(), %err, "analysis rejected"),
        }
        result
    }

    fn run(&self, files: Vec<UploadedFile>) -> Result<Vec<AnalyzedStudent>> {
        let files = classify_files(files)?;
        for file in [&files.students, &files.academic_records, &files.activity_records] {
            SpreadsheetFormat::detect(&file.filename)?;
        }

        let roster = reader::read_roster(&reader::decode(&files.students)?)?;
        let academic = reader::read_academic_records(&reader::decode(&files.academic_records)?)?;
        let activity = reader::read_activity_records(&reader::decode(&files.activity_records)?)?;
        debug!(
            students = roster.students.len(),
            academic_records = academic.len(),
            activity_records = activity.records.len(),
            "sources decoded"
        );

        let policy = FeePolicy::for_sources(&roster, &activity);
        let aggregates = Aggregates {
            academic: summarize_academics(&academic),
            attendance: summarize_attendance(&activity.records),
            fees: resolve_fee_status(&roster, &activity, policy),
        };

        let students = reconcile(&roster, &aggregates);
        let predictions = self
            .predictor
            .predict(&students)
            .map_err(AnalysisError::unexpected)?;

        Ok(students
            .into_iter()
            .zip(predictions)
            .map(|(student, predicted_risk)| AnalyzedStudent {
                student,
                predicted_risk,
            })
            .collect())
    }
}
