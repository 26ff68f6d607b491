use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors returned before a WebSocket upgrade completes.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    /// Server-wide connection cap reached.
    Unavailable(String),
    /// Per-IP connection cap reached.
    TooManyConnections(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest(m) | Self::Unavailable(m) | Self::TooManyConnections(m) => {
                write!(f, "{m}")
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Self::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            Self::TooManyConnections(m) => (StatusCode::TOO_MANY_REQUESTS, m.clone()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
