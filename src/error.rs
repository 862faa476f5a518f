use axum::{
    extract::rejection::BytesRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed request body or schema violation
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No route matches the request path
    #[error("Not found: {0}")]
    NotFound(String),

    /// The route exists but not for this method
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// Tokenizer or model artifact could not be read or is incompatible
    #[error("Artifact load error ({path}): {message}")]
    ArtifactLoad { path: String, message: String },

    /// Vectorization or model evaluation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build an artifact load error for the given path
    pub fn artifact(path: impl AsRef<std::path::Path>, message: impl Into<String>) -> Self {
        AppError::ArtifactLoad {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::ArtifactLoad { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            AppError::ArtifactLoad { .. } => "ARTIFACT_LOAD_ERROR",
            AppError::Inference(_) => "INFERENCE_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Convert AppError to HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_code = error_code,
                status_code = status.as_u16(),
                message = %message,
                "Request rejected"
            );
        }

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_code])
            .inc();

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Shape errors only arise while evaluating a model
impl From<ndarray::ShapeError> for AppError {
    fn from(err: ndarray::ShapeError) -> Self {
        AppError::Inference(err.to_string())
    }
}

/// Runtime failures while building or running an ONNX session
impl From<ort::Error> for AppError {
    fn from(err: ort::Error) -> Self {
        AppError::Inference(err.to_string())
    }
}

/// The request body could not be read
impl From<BytesRejection> for AppError {
    fn from(rejection: BytesRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
