//! HTTP handlers.

use super::error::AppError;
use super::AppContext;
use crate::conversion::ConversionResponse;
use crate::quota::QuotaRecord;
use crate::upload::IncomingFile;
use audioforge_common::paths::header_safe_name;
use audioforge_common::Error;
use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio_util::io::ReaderStream;

/// Multipart field carrying the upload.
pub const UPLOAD_FIELD: &str = "file";

pub fn conversion_routes() -> Router<AppContext> {
    Router::new()
        .route("/convert", post(convert))
        .route("/conversionCount", get(conversion_count))
        .route("/download/:filename", get(download).delete(discard))
}

async fn convert(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<Json<ConversionResponse>, AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file = IncomingFile {
            original_name: field.file_name().unwrap_or_default().to_string(),
            content_type: field.content_type().map(str::to_string),
            body: field,
        };

        let response = ctx.orchestrator.convert(file).await?;
        return Ok(Json(response));
    }

    tracing::warn!("Convert request without a {:?} field", UPLOAD_FIELD);
    Err(Error::invalid_input(format!("No file uploaded (expected field {:?})", UPLOAD_FIELD)).into())
}

async fn conversion_count(State(ctx): State<AppContext>) -> Json<QuotaRecord> {
    Json(ctx.orchestrator.conversion_count())
}

async fn download(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    let artifact = ctx.orchestrator.retrieve(&filename).await?;

    // Cleanup may win the race between the lookup and the open
    let file = match tokio::fs::File::open(&artifact.path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::artifact_not_found(filename).into())
        }
        Err(e) => return Err(Error::from(e).into()),
    };

    tracing::info!(artifact = %filename, bytes = artifact.size, "Serving download");

    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_name(&artifact.download_name)
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, artifact.mime_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, artifact.size.to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

async fn discard(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<StatusCode, AppError> {
    ctx.orchestrator.discard(&filename).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn health(State(ctx): State<AppContext>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "pending_cleanups": ctx.cleanup.pending(),
    }))
}
