//! Per-request conversion flow.
//!
//! `Received → QuotaChecked → Uploading → Converting → {Succeeded, Failed}`
//!
//! A quota slot is reserved before the body is read and only committed once
//! the engine reports success. Everything from the engine start onward runs
//! on its own task, so a client that disconnects mid-conversion still gets
//! its quota and files settled.

use super::cleanup::CleanupScheduler;
use super::engine::{ConversionHandle, ConversionEngine};
use crate::artifacts::{Artifact, ArtifactStore, ConvertedArtifact};
use crate::quota::{QuotaRecord, QuotaReservation, QuotaStore};
use crate::upload::{remove_if_present, IncomingFile, StagedUpload, UploadReceiver};
use audioforge_common::{Error, JobId, Result};
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

/// Body of a successful `POST /convert`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub success: bool,
    pub file_name: String,
    pub download_url: String,
}

#[derive(Clone)]
pub struct ConversionOrchestrator {
    quota: Arc<QuotaStore>,
    daily_limit: u32,
    uploads: UploadReceiver,
    engine: ConversionEngine,
    artifacts: Arc<ArtifactStore>,
    cleanup: CleanupScheduler,
    retention: Duration,
    download_grace: Duration,
    base_url: String,
}

impl ConversionOrchestrator {
    pub fn new(
        quota: Arc<QuotaStore>,
        uploads: UploadReceiver,
        engine: ConversionEngine,
        artifacts: Arc<ArtifactStore>,
        cleanup: CleanupScheduler,
    ) -> Self {
        Self {
            quota,
            daily_limit: 3,
            uploads,
            engine,
            artifacts,
            cleanup,
            retention: Duration::from_secs(300),
            download_grace: Duration::from_secs(60),
            base_url: "http://localhost:5000".to_string(),
        }
    }

    pub fn with_daily_limit(mut self, limit: u32) -> Self {
        self.daily_limit = limit;
        self
    }

    /// How long a successful job's files are kept.
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Minimum time left for a download that starts near expiry.
    pub fn with_download_grace(mut self, grace: Duration) -> Self {
        self.download_grace = grace;
        self
    }

    /// Prefix for download links. A trailing slash is ignored.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Run one upload through the whole pipeline.
    pub async fn convert<S, E>(&self, file: IncomingFile<S>) -> Result<ConversionResponse>
    where
        S: Stream<Item = std::result::Result<Bytes, E>>,
        E: Display,
    {
        let job_id = JobId::new();
        tracing::debug!(job_id = %job_id, state = "received", original_name = %file.original_name);

        let reservation = self.quota.reserve(self.daily_limit)?;
        tracing::debug!(job_id = %job_id, state = "quota_checked");

        // An upload failure drops the reservation, which releases the slot
        let staged = self.uploads.receive(job_id, file).await?;
        tracing::debug!(job_id = %job_id, state = "uploading", bytes = staged.size);

        let artifact = self.artifacts.plan(job_id, &staged.original_name);
        let handle = self.engine.start(
            staged.path.clone(),
            artifact.path.clone(),
            self.artifacts.format(),
        );
        tracing::info!(
            job_id = %job_id,
            state = "converting",
            engine = self.engine.name(),
            "Converting {}",
            staged.original_name
        );

        let this = self.clone();
        tokio::spawn(async move { this.settle(reservation, staged, artifact, handle).await })
            .await
            .map_err(|e| Error::internal(format!("Conversion task failed: {}", e)))?
    }

    async fn settle(
        &self,
        reservation: QuotaReservation,
        staged: StagedUpload,
        artifact: ConvertedArtifact,
        handle: ConversionHandle,
    ) -> Result<ConversionResponse> {
        let job_id = staged.job_id;

        match handle.await {
            Ok(()) => {
                let record = reservation.commit();
                self.artifacts.register(&artifact);
                self.cleanup.schedule(
                    job_id,
                    staged.path.clone(),
                    artifact.stored_name.clone(),
                    self.retention,
                );

                tracing::info!(
                    job_id = %job_id,
                    state = "succeeded",
                    count = record.count,
                    "Converted {} to {}",
                    staged.original_name,
                    artifact.derived_name
                );

                Ok(ConversionResponse {
                    success: true,
                    download_url: format!("{}/download/{}", self.base_url, artifact.stored_name),
                    file_name: artifact.derived_name,
                })
            }
            Err(diagnostic) => {
                drop(reservation);
                tracing::error!(job_id = %job_id, state = "failed", "Conversion failed: {}", diagnostic);

                if let Err(e) = staged.remove().await {
                    tracing::warn!(job_id = %job_id, "Failed to delete staged input: {}", e);
                }

                Err(Error::ConversionFailed)
            }
        }
    }

    /// Look up an artifact for download.
    ///
    /// A download that starts close to expiry pushes the cleanup back so the
    /// file outlives the transfer.
    pub async fn retrieve(&self, name: &str) -> Result<Artifact> {
        let artifact = self.artifacts.retrieve(name).await?;
        if let Some(job_id) = self.artifacts.job_id_of(name) {
            self.cleanup.extend(job_id, self.download_grace);
        }
        Ok(artifact)
    }

    /// Delete a job's files ahead of its retention deadline.
    pub async fn discard(&self, name: &str) -> Result<()> {
        if let Some(staged) = self.artifacts.job_id_of(name).and_then(|id| self.cleanup.cancel(id)) {
            if let Err(e) = remove_if_present(&staged).await {
                tracing::warn!("Failed to delete staged input {:?}: {}", staged, e);
            }
        }
        self.artifacts.discard(name).await?;
        tracing::info!(artifact = name, "Artifact discarded");
        Ok(())
    }

    /// Persisted quota record, without rollover.
    pub fn conversion_count(&self) -> QuotaRecord {
        self.quota.snapshot()
    }
}
