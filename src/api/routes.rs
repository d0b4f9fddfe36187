//! API route definitions.

use super::state::AppState;
use super::ApiError;
use crate::detect::{Evaluation, Outcome, SampleRecord, ScenarioClass, TraceStep};
use crate::inference::{validate_threshold, SensorReading};
use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn};
use uuid::Uuid;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .route("/evaluate", post(evaluate))
}

async fn root() -> Json<Value> {
    Json(json!({ "greeting": "Monitor the Reactor API is running" }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "modelloaded": state.pipeline.model_loaded(),
        "preprocessorloaded": state.pipeline.scaler_loaded(),
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[derive(Debug, Deserialize)]
struct PredictRequest {
    #[serde(flatten)]
    reading: SensorReading,
    threshold: Option<f64>,
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    req.reading.validate()?;
    let threshold = req.threshold.unwrap_or(state.alert_threshold);
    validate_threshold(threshold)?;

    let prediction = state.pipeline.predict_with_alert(&req.reading, threshold)?;
    if prediction.alert {
        warn!(probability = prediction.probability, threshold, "fault alert raised");
    }

    Ok(Json(json!({
        "probability": prediction.probability,
        "alert": prediction.alert,
        "threshold": prediction.threshold,
        "modelready": state.pipeline.is_ready(),
    })))
}

#[derive(Debug, Deserialize)]
struct EvaluateRequest {
    scenario: i64,
    #[serde(default)]
    records: Vec<SampleRecord>,
    #[serde(default)]
    include_trace: bool,
}

async fn evaluate(
    State(state): State<AppState>,
    payload: Result<Json<EvaluateRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(req) = payload?;
    let scenario = ScenarioClass::new(req.scenario)?;
    let run_id = Uuid::new_v4();
    let params = state.params;
    let include_trace = req.include_trace;
    let records = req.records;
    info!(%run_id, %scenario, records = records.len(), "evaluation requested");

    let token = CancellationToken::new();
    let worker_token = token.clone();
    let mut handle = tokio::task::spawn_blocking(move || {
        let _span = info_span!("evaluate", %run_id, %scenario).entered();
        let evaluation =
            Evaluation::new(params, scenario, records).with_cancellation(worker_token);
        if include_trace {
            evaluation.run_with_trace().map(|(o, t)| (o, Some(t)))
        } else {
            evaluation.run().map(|o| (o, None))
        }
    });

    let joined = match tokio::time::timeout(state.evaluate_timeout, &mut handle).await {
        Ok(joined) => joined,
        Err(_) => {
            warn!(%run_id, "evaluation exceeded its time budget, cancelling");
            token.cancel();
            handle.await
        }
    };
    let (outcome, trace): (Outcome, Option<Vec<TraceStep>>) = joined??;

    let mut body = json!({
        "run_id": run_id,
        "scenario": scenario,
        "report": outcome.report,
        "samples_evaluated": outcome.samples_evaluated,
        "cancelled": outcome.cancelled,
    });
    if let Some(trace) = trace {
        body["trace"] = json!(trace);
    }
    Ok(Json(body))
}
