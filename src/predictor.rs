use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use tracing::{info, warn};

use crate::forest::RandomForest;
use crate::models::{ReconciledStudent, RiskPrediction};
use crate::reader::cell_key;

pub const MODEL_FILE: &str = "student_risk_model.json";
pub const ENCODER_FILE: &str = "fee_status_encoder.json";
pub const FEATURES_FILE: &str = "feature_names.json";

pub const UNKNOWN_FEE_STATUS: &str = "Unknown";

pub trait RiskClassifier: Send + Sync {
    fn predict(&self, features: &[f64]) -> anyhow::Result<String>;
}

impl RiskClassifier for RandomForest {
    fn predict(&self, features: &[f64]) -> anyhow::Result<String> {
        Ok(self.predict_label(features)?.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeeStatusEncoder {
    classes: Vec<String>,
}

impl FeeStatusEncoder {
    pub fn new(classes: Vec<String>) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn with_unknown(mut self) -> Self {
        if !self.classes.iter().any(|class| class == UNKNOWN_FEE_STATUS) {
            self.classes.push(UNKNOWN_FEE_STATUS.to_string());
        }
        self
    }

    fn index_of(&self, status: &str) -> Option<usize> {
        self.classes.iter().position(|class| class == status)
    }

    pub fn encode(&self, status: &str) -> anyhow::Result<f64> {
        self.index_of(status)
            .or_else(|| self.index_of(UNKNOWN_FEE_STATUS))
            .map(|index| index as f64)
            .ok_or_else(|| anyhow!("fee status `{status}` is not in the encoder vocabulary"))
    }
}

struct LoadedModel {
    classifier: Box<dyn RiskClassifier>,
    encoder: FeeStatusEncoder,
    feature_names: Vec<String>,
}

pub struct RiskPredictor {
    model: Option<LoadedModel>,
}

impl RiskPredictor {
    pub fn unavailable() -> Self {
        Self { model: None }
    }

    /// The encoder gains `Unknown` here and is never mutated afterwards.
    pub fn new(
        classifier: Box<dyn RiskClassifier>,
        encoder: FeeStatusEncoder,
        feature_names: Vec<String>,
    ) -> Self {
        Self {
            model: Some(LoadedModel {
                classifier,
                encoder: encoder.with_unknown(),
                feature_names,
            }),
        }
    }

    /// Missing files disable prediction; unusable ones are an error.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let model_path = dir.join(MODEL_FILE);
        let encoder_path = dir.join(ENCODER_FILE);
        let features_path = dir.join(FEATURES_FILE);

        let (Some(model_json), Some(encoder_json), Some(features_json)) = (
            read_artifact(&model_path)?,
            read_artifact(&encoder_path)?,
            read_artifact(&features_path)?,
        ) else {
            warn!(dir = %dir.display(), "model artifacts not found, predictions will be disabled");
            return Ok(Self::unavailable());
        };

        let forest: RandomForest = serde_json::from_str(&model_json)
            .with_context(|| format!("invalid classifier in {}", model_path.display()))?;
        let encoder: FeeStatusEncoder = serde_json::from_str(&encoder_json)
            .with_context(|| format!("invalid encoder in {}", encoder_path.display()))?;
        let feature_names: Vec<String> = serde_json::from_str(&features_json)
            .with_context(|| format!("invalid feature list in {}", features_path.display()))?;

        forest.validate(feature_names.len()).with_context(|| {
            format!(
                "classifier in {} does not fit the feature list",
                model_path.display()
            )
        })?;

        let trees = forest.trees.len();
        let predictor = Self::new(Box::new(forest), encoder, feature_names);
        info!(
            trees,
            vocabulary = ?predictor.fee_status_vocabulary(),
            "risk model loaded"
        );
        Ok(predictor)
    }

    pub fn is_available(&self) -> bool {
        self.model.is_some()
    }

    pub fn fee_status_vocabulary(&self) -> Option<&[String]> {
        self.model.as_ref().map(|model| model.encoder.classes())
    }

    pub fn predict(&self, students: &[ReconciledStudent]) -> anyhow::Result<Vec<RiskPrediction>> {
        let Some(model) = &self.model else {
            return Ok(vec![RiskPrediction::Unavailable; students.len()]);
        };

        students
            .iter()
            .map(|student| {
                let features = model.feature_vector(student)?;
                let label = model.classifier.predict(&features).with_context(|| {
                    format!("classifier failed for student {}", student.student_id)
                })?;
                Ok(RiskPrediction::Predicted(label))
            })
            .collect()
    }
}

impl LoadedModel {
    fn feature_vector(&self, student: &ReconciledStudent) -> anyhow::Result<Vec<f64>> {
        self.feature_names
            .iter()
            .map(|name| self.feature_value(student, name))
            .collect()
    }

    fn feature_value(&self, student: &ReconciledStudent, name: &str) -> anyhow::Result<f64> {
        let value = match name {
            "overall_grade_avg" => student.overall_grade_avg,
            "failed_subjects_count" => f64::from(student.failed_subjects_count),
            "attendance_percentage" => student.attendance_percentage,
            "has_consecutive_absences" => f64::from(u8::from(student.has_consecutive_absences)),
            "fee_status_encoded" => self.encoder.encode(&student.fee_status)?,
            other => match student.roster.get(other) {
                Some(cell) => match cell.as_f64() {
                    Some(number) => number,
                    None => bail!(
                        "feature `{other}` of student {} is not numeric ({})",
                        student.student_id,
                        cell_key(cell).unwrap_or_default()
                    ),
                },
                None => bail!("feature `{other}` is not available for prediction"),
            },
        };
        Ok(value)
    }
}

fn read_artifact(path: &Path) -> anyhow::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}
