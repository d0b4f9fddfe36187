//! Single-reading fault probability behind the `/predict` endpoint.

pub mod model;

pub use self::model::{LogisticModel, Prediction, PredictionPipeline, Scaler};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("`{name}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("invalid model artefact {path}: {reason}")]
    InvalidArtefact { path: String, reason: String },

    #[error("feature vector length mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Feature order the classifier was trained on.
pub const FEATURE_ORDER: [&str; 4] = ["temperature", "pressure", "flowrate", "vibration"];

/// Accepted bounds per feature, in `FEATURE_ORDER`.
const FEATURE_BOUNDS: [(f64, f64); 4] = [(-50.0, 200.0), (0.0, 50.0), (0.0, 1000.0), (0.0, 50.0)];

/// One reactor reading submitted for scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: f64,
    pub pressure: f64,
    pub flowrate: f64,
    pub vibration: f64,
}

impl SensorReading {
    pub fn to_vector(&self) -> Vec<f64> {
        vec![self.temperature, self.pressure, self.flowrate, self.vibration]
    }

    /// Reject readings outside the physical envelope of the sensors.
    pub fn validate(&self) -> Result<(), InferenceError> {
        for ((name, value), (min, max)) in FEATURE_ORDER
            .into_iter()
            .zip(self.to_vector())
            .zip(FEATURE_BOUNDS)
        {
            if !(min..=max).contains(&value) {
                return Err(InferenceError::OutOfRange {
                    name,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}

/// Reject an alert threshold outside [0, 1].
pub fn validate_threshold(threshold: f64) -> Result<(), InferenceError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(InferenceError::OutOfRange {
            name: "threshold",
            value: threshold,
            min: 0.0,
            max: 1.0,
        });
    }
    Ok(())
}
