//! Converted artifacts awaiting download.
//!
//! Artifacts are stored as `<job-id>.<ext>` in the artifact directory. The
//! name derived from the client's upload is kept alongside in memory and
//! only ever used as the download's display name.

use crate::upload::remove_if_present;
use audioforge_av::AudioFormat;
use audioforge_common::paths::{derive_output_name, is_safe_file_name};
use audioforge_common::{Error, JobId, Result};
use dashmap::DashMap;
use std::path::PathBuf;

/// Output of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConvertedArtifact {
    pub job_id: JobId,
    pub path: PathBuf,
    /// Name the artifact is retrieved by.
    pub stored_name: String,
    /// Upload's base name with the target extension.
    pub derived_name: String,
}

/// A resolved artifact ready to be served.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub download_name: String,
    pub mime_type: &'static str,
    pub size: u64,
}

pub struct ArtifactStore {
    dir: PathBuf,
    format: AudioFormat,
    display_names: DashMap<String, String>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, format: AudioFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
            display_names: DashMap::new(),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// Describe where a job's artifact will be written.
    pub fn plan(&self, job_id: JobId, original_name: &str) -> ConvertedArtifact {
        let stored_name = job_id.file_name(self.format.extension());
        ConvertedArtifact {
            job_id,
            path: self.dir.join(&stored_name),
            derived_name: derive_output_name(original_name, self.format.extension()),
            stored_name,
        }
    }

    /// Make a finished artifact retrievable.
    pub fn register(&self, artifact: &ConvertedArtifact) {
        self.display_names
            .insert(artifact.stored_name.clone(), artifact.derived_name.clone());
    }

    /// Job behind a retrieval name, if the name is exactly one this store
    /// hands out (`<job-id>.<ext>`). In-progress `.part` files and anything
    /// else in the directory do not qualify.
    pub fn job_id_of(&self, name: &str) -> Option<JobId> {
        if !is_safe_file_name(name) {
            return None;
        }
        JobId::from_file_name(name).filter(|id| id.file_name(self.format.extension()) == name)
    }

    /// Resolve a retrieval name to a file on disk.
    ///
    /// Names this store did not hand out never touch the filesystem.
    pub async fn retrieve(&self, name: &str) -> Result<Artifact> {
        if self.job_id_of(name).is_none() {
            tracing::warn!("Rejected artifact name {:?}", name);
            return Err(Error::artifact_not_found(name));
        }

        let path = self.dir.join(name);
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(Error::artifact_not_found(name)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::artifact_not_found(name))
            }
            Err(e) => return Err(e.into()),
        };

        let download_name = self
            .display_names
            .get(name)
            .map(|entry| entry.value().clone())
            .unwrap_or_else(|| name.to_string());

        Ok(Artifact {
            path,
            download_name,
            mime_type: self.format.mime_type(),
            size: metadata.len(),
        })
    }

    /// Delete an artifact now.
    ///
    /// Returns `ArtifactNotFound` if there was nothing to delete.
    pub async fn discard(&self, name: &str) -> Result<()> {
        if self.job_id_of(name).is_none() {
            return Err(Error::artifact_not_found(name));
        }

        let path = self.dir.join(name);
        self.forget(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::artifact_not_found(name))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an artifact if it is still present. Used by scheduled cleanup.
    pub async fn expire(&self, name: &str) -> std::io::Result<()> {
        self.forget(name);
        if self.job_id_of(name).is_none() {
            return Ok(());
        }
        remove_if_present(&self.dir.join(name)).await
    }

    pub fn forget(&self, name: &str) {
        self.display_names.remove(name);
    }

    /// Number of artifacts currently registered.
    pub fn len(&self) -> usize {
        self.display_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display_names.is_empty()
    }
}
