use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Failures raised while talking to the external AI service
///
/// Each variant is produced by exactly one failure mode of the gateway and
/// carries its own structured fields. None of them are retried in place.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum UpstreamError {
    /// Connect or read deadline elapsed, or the host was unreachable
    #[error("AI timeout/connection error: {message}")]
    Timeout { message: String },

    /// The service answered with a 4xx/5xx status
    #[error("AI error: status={status}, body={body}")]
    Http { status: u16, body: String },

    /// Non-error status outside 2xx, or a 2xx with no body
    #[error("AI bad response: {message}")]
    BadResponse { message: String },

    /// A well-formed response whose application status is not "success"
    #[error("AI status is not success. status={status}, message={message}")]
    ApplicationFailure { status: String, message: String },

    /// A successful response missing a mandatory collection
    #[error("AI bad schema: {message}")]
    BadSchema { message: String },

    /// Any other client-side failure (request building, decoding, ...)
    #[error("AI client error: {message}")]
    Client { message: String },
}

impl UpstreamError {
    /// Machine-readable code, stable across releases
    pub fn code(&self) -> String {
        match self {
            UpstreamError::Timeout { .. } => "AI_TIMEOUT".to_string(),
            UpstreamError::Http { status, .. } => format!("AI_HTTP_{}", status),
            UpstreamError::BadResponse { .. } => "AI_BAD_RESPONSE".to_string(),
            UpstreamError::ApplicationFailure { .. } => "AI_APP_FAIL".to_string(),
            UpstreamError::BadSchema { .. } => "AI_BAD_SCHEMA".to_string(),
            UpstreamError::Client { .. } => "AI_CLIENT_ERROR".to_string(),
        }
    }

    /// Category name recorded in audit events
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::Timeout { .. } => "UpstreamTimeout",
            UpstreamError::Http { .. } => "UpstreamHttpError",
            UpstreamError::BadResponse { .. } => "UpstreamBadResponse",
            UpstreamError::ApplicationFailure { .. } => "UpstreamApplicationFailure",
            UpstreamError::BadSchema { .. } => "UpstreamBadSchema",
            UpstreamError::Client { .. } => "UpstreamClientError",
        }
    }

    /// HTTP status surfaced to a direct caller of the gateway
    pub fn status_code(&self) -> StatusCode {
        match self {
            UpstreamError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Short category name, used in logs and audit payloads
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DatabaseError",
            AppError::Cache(_) => "CacheError",
            AppError::HttpClient(_) => "HttpClientError",
            AppError::NotFound(_) => "NotFoundError",
            AppError::Validation(_) => "ValidationError",
            AppError::Upstream(e) => e.kind(),
            AppError::ExternalApi(_) => "ExternalApiError",
            AppError::Internal(_) => "InternalError",
        }
    }

    pub fn code(&self) -> String {
        match self {
            AppError::Upstream(e) => e.code(),
            AppError::NotFound(_) => "NOT_FOUND".to_string(),
            AppError::Validation(_) => "BAD_REQUEST".to_string(),
            AppError::ExternalApi(_) | AppError::HttpClient(_) => "EXTERNAL_API_ERROR".to_string(),
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                "INTERNAL_ERROR".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(ref e) => (e.status_code(), e.to_string()),
            AppError::Database(_) | AppError::Cache(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
        };

        let body = Json(json!({
            "code": code,
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
