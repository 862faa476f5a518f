use crate::api::AppState;
use crate::error::{AppError, Result};
use crate::metrics::{PREDICTIONS_TOTAL, PREDICTION_DURATION_SECONDS};
use crate::ml::Verdict;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, Method, StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Liveness text returned by `GET /`
pub const INDEX_MESSAGE: &str = "Spam detection API is running";

/// Liveness check; never touches the artifacts
pub async fn index() -> &'static str {
    INDEX_MESSAGE
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        variant: state.variant().to_string(),
        artifacts_loaded: state.loader.is_loaded(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    })
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub variant: String,
    pub artifacts_loaded: bool,
    pub uptime_seconds: u64,
}

/// Body of `POST /predict`
#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    /// Text to classify; absent or null means the empty string
    #[serde(default)]
    pub message: Option<String>,
}

impl PredictRequest {
    /// Parse a body as a JSON object regardless of the declared content type
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Failed to decode JSON object: {}", e)))?;

        if !value.is_object() {
            return Err(AppError::BadRequest(
                "Request body must be a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value)
            .map_err(|e| AppError::BadRequest(format!("Invalid request: {}", e)))
    }

    pub fn into_message(self) -> String {
        self.message.unwrap_or_default()
    }
}

/// Classify one message
pub async fn predict(
    State(state): State<AppState>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Result<Json<Verdict>> {
    let scorer = state.loader.ensure_loaded().await?;
    let message = PredictRequest::from_body(&body?)?.into_message();

    let variant = scorer.variant();
    let start = Instant::now();
    let verdict = scorer.score(&message)?;

    PREDICTION_DURATION_SECONDS
        .with_label_values(&[variant.as_str()])
        .observe(start.elapsed().as_secs_f64());
    PREDICTIONS_TOTAL
        .with_label_values(&[variant.as_str(), verdict.label()])
        .inc();

    tracing::debug!(
        variant = %variant,
        message_chars = message.chars().count(),
        prediction = verdict.label(),
        confidence = verdict.confidence(),
        "Message scored"
    );

    Ok(Json(verdict))
}

/// Fallback for paths no route matches
pub async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::NotFound(format!("{} {}", method, uri.path()))
}

/// Fallback for known paths hit with an unsupported method
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(format!("{} {}", method, uri.path()))
}

/// Prometheus metrics endpoint
pub async fn metrics() -> impl IntoResponse {
    let metrics = crate::metrics::gather_metrics();
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics,
    )
}
