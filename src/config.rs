//! TOML configuration for the reactor monitor.
//!
//! Layered: an explicit path, then the `REACTORMONITOR_CONFIG` environment
//! variable, then `./reactormonitor.toml`, then compiled-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detect::evaluator::{
    DEFAULT_DETECTION_THRESHOLD, DEFAULT_INJECTION_TIME_MINUTES, DEFAULT_PERSISTENCE_LIMIT,
    DEFAULT_SAMPLE_PERIOD_MINUTES,
};
use crate::detect::{DetectError, EvaluatorParams};

pub const CONFIG_ENV_VAR: &str = "REACTORMONITOR_CONFIG";
pub const LOCAL_CONFIG_PATH: &str = "reactormonitor.toml";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl MonitorConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        info!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Resolve configuration in layer order.
    ///
    /// An explicit path must load; the fallback layers only warn.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "{} set but file could not be loaded, trying fallback", CONFIG_ENV_VAR
                    );
                }
            }
        }

        let local = Path::new(LOCAL_CONFIG_PATH);
        if local.exists() {
            match Self::load(local) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %local.display(),
                        error = %e,
                        "local config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

/// Detection/diagnosis timing constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Minutes between two samples of the replay.
    pub sample_period_minutes: f64,
    /// Replay minute at which the fault is introduced.
    pub injection_time_minutes: f64,
    /// Detector score strictly above which a sample is anomalous, in [0, 1].
    pub detection_threshold: f64,
    /// Consecutive matching diagnoses needed to confirm a fault class.
    pub persistence_limit: u32,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            sample_period_minutes: DEFAULT_SAMPLE_PERIOD_MINUTES,
            injection_time_minutes: DEFAULT_INJECTION_TIME_MINUTES,
            detection_threshold: DEFAULT_DETECTION_THRESHOLD,
            persistence_limit: DEFAULT_PERSISTENCE_LIMIT,
        }
    }
}

impl EvaluatorConfig {
    pub fn params(&self) -> Result<EvaluatorParams, DetectError> {
        EvaluatorParams::new(
            self.sample_period_minutes,
            self.injection_time_minutes,
            self.detection_threshold,
            self.persistence_limit,
        )
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Classifier artefacts behind `/predict`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// JSON logistic model (weights + bias).
    pub model_path: PathBuf,
    /// JSON standardising scaler (means + stds).
    pub scaler_path: PathBuf,
    /// Probability at or above which `/predict` raises an alert.
    pub alert_threshold: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/bestmodel.json"),
            scaler_path: PathBuf::from("models/preprocessor.json"),
            alert_threshold: 0.8,
        }
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Wall-clock bound on one `/evaluate` request.
    pub evaluate_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            evaluate_timeout_ms: 5_000,
        }
    }
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Remote scenario API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Base URL of the scenario API, if any.
    pub api_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            request_timeout_secs: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
