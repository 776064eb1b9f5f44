//! API route definitions.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::error::ApiError;
use super::state::AppState;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/api/analyze/anomaly", post(analyze_anomaly))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    if state.is_ready() {
        (
            StatusCode::OK,
            Json(json!({ "status": "operational", "model_status": "loaded" })),
        )
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "degraded", "model_status": "not_loaded" })),
        )
    }
}

/// Validated body of an analysis request.
#[derive(Debug)]
struct AnalyzeRequest {
    /// Echoed back verbatim, whatever JSON type the caller used.
    device_id: Value,
    power: f64,
}

impl AnalyzeRequest {
    fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        // Fields stay raw until checked individually, so an unrepresentable
        // `power` literal is a type error rather than an unreadable body.
        let Ok(mut fields) = serde_json::from_slice::<HashMap<String, Box<RawValue>>>(body) else {
            return Err(ApiError::MissingFields);
        };

        let (Some(power), Some(device_id)) = (fields.remove("power"), fields.remove("deviceId"))
        else {
            return Err(ApiError::MissingFields);
        };

        let power = parse_power(&power)?;
        let device_id =
            serde_json::from_str::<Value>(device_id.get()).map_err(|_| ApiError::MissingFields)?;

        Ok(Self { device_id, power })
    }
}

/// Accept a JSON number or a numeric string; the result must be finite.
fn parse_power(raw: &RawValue) -> Result<f64, ApiError> {
    let power = match serde_json::from_str::<Value>(raw.get()) {
        Ok(Value::Number(n)) => n.as_f64(),
        Ok(Value::String(s)) => s.trim().parse::<f64>().ok(),
        // Out-of-range number literals such as 1e400 land here.
        _ => None,
    };
    power
        .filter(|p| p.is_finite())
        .ok_or(ApiError::InvalidPower)
}

#[derive(Debug, Serialize)]
struct AnalysisResponse {
    #[serde(rename = "deviceId")]
    device_id: Value,
    power_consumption: f64,
    is_anomaly: bool,
    anomaly_score: f64,
    analysis_timestamp: String,
}

async fn analyze_anomaly(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let model = state.model.as_deref().ok_or(ApiError::ModelUnavailable)?;
    let request = AnalyzeRequest::from_body(&body)?;

    let analysis = model.analyze(request.power)?;
    tracing::debug!(
        device_id = %request.device_id,
        power = request.power,
        is_anomaly = analysis.is_anomaly,
        score = analysis.anomaly_score,
        "reading analyzed"
    );

    Ok(Json(AnalysisResponse {
        device_id: request.device_id,
        power_consumption: request.power,
        is_anomaly: analysis.is_anomaly,
        anomaly_score: analysis.anomaly_score,
        analysis_timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    }))
}
