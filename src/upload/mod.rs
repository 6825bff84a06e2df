//! Upload staging.
//!
//! The receiver checks an upload's declared content type before touching the
//! disk, then streams the body into the staging directory under a name
//! derived from the job ID, never from the client's file name.

use audioforge_common::paths::{base_name, file_extension};
use audioforge_common::{Error, JobId, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// An upload as it arrives: metadata plus a body that has not been read yet.
pub struct IncomingFile<S> {
    /// File name the client sent.
    pub original_name: String,
    /// Content type the client declared for the file part.
    pub content_type: Option<String>,
    /// The file's bytes.
    pub body: S,
}

/// An upload written to staging.
#[derive(Debug, Clone)]
pub struct StagedUpload {
    pub job_id: JobId,
    pub path: PathBuf,
    pub declared_mime_type: String,
    pub original_name: String,
    pub size: u64,
}

impl StagedUpload {
    /// Delete the staged file. Absence is not an error.
    pub async fn remove(&self) -> std::io::Result<()> {
        remove_if_present(&self.path).await
    }
}

/// Delete a file, treating "already gone" as success.
pub async fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Media type without parameters, lowercased (`Video/MP4; codecs=x` → `video/mp4`).
fn essence(mime: &str) -> String {
    mime.split(';').next().unwrap_or_default().trim().to_lowercase()
}

/// Validates and stages incoming uploads.
#[derive(Debug, Clone)]
pub struct UploadReceiver {
    staging_dir: PathBuf,
    accepted_mime: String,
    max_bytes: Option<u64>,
}

impl UploadReceiver {
    pub fn new(staging_dir: impl Into<PathBuf>, accepted_mime: impl Into<String>) -> Self {
        Self {
            staging_dir: staging_dir.into(),
            accepted_mime: essence(&accepted_mime.into()),
            max_bytes: None,
        }
    }

    /// Reject uploads larger than `max_bytes`.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Check a declared content type against the one accepted type.
    pub fn validate(&self, content_type: Option<&str>) -> Result<()> {
        let declared = content_type.map(essence).unwrap_or_default();
        if declared == self.accepted_mime {
            Ok(())
        } else {
            Err(Error::unsupported_media_type(
                if declared.is_empty() { "none".to_string() } else { declared },
                self.accepted_mime.clone(),
            ))
        }
    }

    /// Staging path for a job's upload, keeping the client's extension when
    /// it has one.
    pub fn staged_path(&self, job_id: JobId, original_name: &str) -> PathBuf {
        let ext = file_extension(original_name).unwrap_or_else(|| {
            self.accepted_mime
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_string()
        });
        self.staging_dir.join(job_id.file_name(&ext))
    }

    /// Validate the upload and stream it into staging.
    ///
    /// Nothing is written when the content type is rejected. If the body
    /// fails or grows past the size limit, the partial file is removed.
    pub async fn receive<S, E>(&self, job_id: JobId, file: IncomingFile<S>) -> Result<StagedUpload>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Display,
    {
        self.validate(file.content_type.as_deref())?;

        let original_name = base_name(&file.original_name).to_string();
        let path = self.staged_path(job_id, &original_name);

        let size = match self.write_body(&path, file.body).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(rm) = remove_if_present(&path).await {
                    tracing::warn!(job_id = %job_id, "Failed to remove partial upload {:?}: {}", path, rm);
                }
                return Err(e);
            }
        };

        tracing::debug!(
            job_id = %job_id,
            original_name = %original_name,
            bytes = size,
            "Upload staged"
        );

        Ok(StagedUpload {
            job_id,
            path,
            declared_mime_type: self.accepted_mime.clone(),
            original_name,
            size,
        })
    }

    async fn write_body<S, E>(&self, path: &Path, body: S) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Display,
    {
        futures::pin_mut!(body);

        let mut out = tokio::fs::File::create(path).await?;
        let mut size: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk =
                chunk.map_err(|e| Error::invalid_input(format!("Failed to read upload: {}", e)))?;

            size += chunk.len() as u64;
            if let Some(max) = self.max_bytes {
                if size > max {
                    return Err(Error::invalid_input(format!(
                        "Upload exceeds the {} byte limit",
                        max
                    )));
                }
            }

            out.write_all(&chunk).await?;
        }

        out.flush().await?;
        Ok(size)
    }
}
