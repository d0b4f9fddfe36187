use super::{InferenceError, SensorReading, FEATURE_ORDER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// Per-feature standardisation fitted at training time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Scaler {
    pub fn transform(&self, raw: &[f64]) -> Result<Vec<f64>, InferenceError> {
        check_len(self.means.len(), raw.len())?;
        Ok(raw
            .iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(x, (mean, std))| {
                // Constant features were left unscaled at fit time.
                let std = if *std == 0.0 { 1.0 } else { *std };
                (x - mean) / std
            })
            .collect())
    }
}

/// Binary fault classifier (logistic regression).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticModel {
    /// Probability of the fault class for one feature vector.
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64, InferenceError> {
        check_len(self.weights.len(), features.len())?;
        let score: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;
        Ok(1.0 / (1.0 + (-score).exp()))
    }
}

/// Result of scoring one reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub probability: f64,
    pub alert: bool,
    pub threshold: f64,
}

/// Optional scaler followed by an optional classifier.
///
/// Either artefact may be absent. Without a classifier every reading scores
/// 0.0; without a scaler raw features go straight to the classifier.
#[derive(Debug, Clone, Default)]
pub struct PredictionPipeline {
    model: Option<LogisticModel>,
    scaler: Option<Scaler>,
}

impl PredictionPipeline {
    pub fn new(
        model: Option<LogisticModel>,
        scaler: Option<Scaler>,
    ) -> Result<Self, InferenceError> {
        let n = FEATURE_ORDER.len();
        if let Some(m) = &model {
            check_len(n, m.weights.len())?;
        }
        if let Some(s) = &scaler {
            check_len(n, s.means.len())?;
            check_len(n, s.stds.len())?;
        }
        Ok(Self { model, scaler })
    }

    /// Load both artefacts from JSON files. A missing file leaves that stage
    /// unloaded; a path that cannot be read or parsed is an error.
    pub fn load(model_path: &Path, scaler_path: &Path) -> Result<Self, InferenceError> {
        let model = load_artefact::<LogisticModel>(model_path)?;
        let scaler = load_artefact::<Scaler>(scaler_path)?;
        Self::new(model, scaler)
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn scaler_loaded(&self) -> bool {
        self.scaler.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.model_loaded() && self.scaler_loaded()
    }

    pub fn preprocess(&self, reading: &SensorReading) -> Result<Vec<f64>, InferenceError> {
        let raw = reading.to_vector();
        match &self.scaler {
            Some(scaler) => scaler.transform(&raw),
            None => Ok(raw),
        }
    }

    pub fn predict_proba(&self, reading: &SensorReading) -> Result<f64, InferenceError> {
        let Some(model) = &self.model else {
            return Ok(0.0);
        };
        let features = self.preprocess(reading)?;
        model.predict_proba(&features)
    }

    /// Score a reading and raise an alert at or above `threshold`.
    pub fn predict_with_alert(
        &self,
        reading: &SensorReading,
        threshold: f64,
    ) -> Result<Prediction, InferenceError> {
        let probability = self.predict_proba(reading)?;
        Ok(Prediction {
            probability,
            alert: probability >= threshold,
            threshold,
        })
    }
}

fn check_len(expected: usize, got: usize) -> Result<(), InferenceError> {
    if expected != got {
        return Err(InferenceError::DimensionMismatch { expected, got });
    }
    Ok(())
}

fn load_artefact<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, InferenceError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "model artefact not found, stage disabled");
            return Ok(None);
        }
        Err(e) => {
            return Err(InferenceError::InvalidArtefact {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
        }
    };
    let artefact = serde_json::from_str(&content).map_err(|e| InferenceError::InvalidArtefact {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    info!(path = %path.display(), "loaded model artefact");
    Ok(Some(artefact))
}
