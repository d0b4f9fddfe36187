use crate::config::MonitorConfig;
use crate::detect::EvaluatorParams;
use crate::inference::PredictionPipeline;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Shared, read-only service state. Each `/evaluate` request builds its own
/// evaluation state; nothing here is mutated after start-up.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PredictionPipeline>,
    pub params: EvaluatorParams,
    pub alert_threshold: f64,
    pub evaluate_timeout: Duration,
}

impl AppState {
    pub fn new(pipeline: PredictionPipeline, params: EvaluatorParams) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            params,
            alert_threshold: 0.8,
            evaluate_timeout: Duration::from_secs(5),
        }
    }

    /// Validate the evaluator section and load the model artefacts.
    pub fn from_config(config: &MonitorConfig) -> Result<Self> {
        let params = config
            .evaluator
            .params()
            .context("invalid [evaluator] configuration")?;
        crate::inference::validate_threshold(config.model.alert_threshold)
            .context("invalid [model] alert_threshold")?;
        let pipeline =
            PredictionPipeline::load(&config.model.model_path, &config.model.scaler_path)
                .context("failed to load model artefacts")?;

        Ok(Self {
            pipeline: Arc::new(pipeline),
            params,
            alert_threshold: config.model.alert_threshold,
            evaluate_timeout: Duration::from_millis(config.server.evaluate_timeout_ms),
        })
    }
}
