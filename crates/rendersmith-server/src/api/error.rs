//! HTTP error responses

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rendersmith::{ErrorKind, RenderError};
use serde_json::json;
use tracing::{error, warn};

/// Error returned by a route handler
#[derive(Debug)]
pub enum ApiError {
    /// Missing or wrong `x-api-key`
    Unauthorized,
    /// Image route failure, rendered as `{error, detail}`
    Render(RenderError),
    /// Video route failure, rendered as `{success: false, error, detail}`
    Video(RenderError),
}

impl ApiError {
    /// HTTP status for this error
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Render(e) | Self::Video(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            Self::Render(_) | Self::Video(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        Self::Render(err)
    }
}

/// Short error label for a failure class
const fn label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::InputValidation => "Invalid request",
        ErrorKind::BatchSize => "Invalid batch size",
        ErrorKind::UnknownComposition => "Unknown composition",
        ErrorKind::RenderRuntime => "Render failed",
        ErrorKind::Video => "Video render failed",
        ErrorKind::Timeout => "Render timed out",
        ErrorKind::Internal => "Internal error",
    }
}

fn log(status: StatusCode, err: &RenderError) {
    if status.is_server_error() {
        error!(error = %err, "request failed");
    } else {
        warn!(error = %err, "request rejected");
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            Self::Unauthorized => json!({
                "error": "Unauthorized",
                "detail": "missing or invalid x-api-key header",
            }),
            Self::Render(err) => {
                log(status, err);
                json!({
                    "error": label(err.kind()),
                    "detail": err.to_string(),
                })
            }
            Self::Video(err) => {
                log(status, err);
                json!({
                    "success": false,
                    "error": label(err.kind()),
                    "detail": err.to_string(),
                })
            }
        };
        (status, Json(body)).into_response()
    }
}
