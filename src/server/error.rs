//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`; the pipeline's
//! [`audioforge_common::Error`] converts into it with `?`.

use audioforge_common::Error;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError(pub Error);

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<MultipartError> for AppError {
    fn from(e: MultipartError) -> Self {
        Self(Error::invalid_input(format!("Malformed multipart body: {}", e.body_text())))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in API handler");
        }

        let body = json!({
            "error": self.0.public_message(),
            "code": self.0.code(),
        });

        (status, axum::Json(body)).into_response()
    }
}
