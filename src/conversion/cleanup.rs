//! Deferred deletion of a job's files.
//!
//! Each successful conversion arms one timer task. Timers live in a map
//! keyed by job ID so they can be cancelled or pushed back. Deletion only
//! happens after the timer wins the race to remove its own map entry, so a
//! cancelled or rescheduled timer never deletes anything.

use crate::artifacts::ArtifactStore;
use crate::upload::remove_if_present;
use audioforge_common::JobId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct CleanupJob {
    staged: PathBuf,
    artifact_name: String,
    deadline: Instant,
    generation: u64,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct CleanupScheduler {
    jobs: Arc<DashMap<JobId, CleanupJob>>,
    artifacts: Arc<ArtifactStore>,
}

impl CleanupScheduler {
    pub fn new(artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            artifacts,
        }
    }

    /// Delete `staged` and the artifact `artifact_name` after `delay`.
    ///
    /// Scheduling the same job again replaces its timer.
    pub fn schedule(&self, job_id: JobId, staged: PathBuf, artifact_name: String, delay: Duration) {
        let deadline = Instant::now() + delay;

        // The entry stays locked until the timer is stored, so even a zero
        // delay finds its own entry.
        match self.jobs.entry(job_id) {
            Entry::Occupied(mut occupied) => {
                let job = occupied.get_mut();
                job.handle.abort();
                job.staged = staged;
                job.artifact_name = artifact_name;
                job.deadline = deadline;
                job.generation += 1;
                job.handle = self.spawn_timer(job_id, deadline, job.generation);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(CleanupJob {
                    staged,
                    artifact_name,
                    deadline,
                    generation: 0,
                    handle: self.spawn_timer(job_id, deadline, 0),
                });
            }
        }

        tracing::debug!(job_id = %job_id, delay = ?delay, "Cleanup scheduled");
    }

    /// Make sure at least `grace` remains before the job's files are deleted.
    ///
    /// Returns false when no cleanup is pending for the job.
    pub fn extend(&self, job_id: JobId, grace: Duration) -> bool {
        let Some(mut job) = self.jobs.get_mut(&job_id) else {
            return false;
        };

        let now = Instant::now();
        if job.deadline.saturating_duration_since(now) < grace {
            job.deadline = now + grace;
            job.generation += 1;
            job.handle.abort();
            job.handle = self.spawn_timer(job_id, job.deadline, job.generation);
            tracing::debug!(job_id = %job_id, grace = ?grace, "Cleanup extended");
        }

        true
    }

    /// Drop the job's timer without deleting anything.
    ///
    /// Returns the staged input path so the caller can decide what to do
    /// with it.
    pub fn cancel(&self, job_id: JobId) -> Option<PathBuf> {
        let (_, job) = self.jobs.remove(&job_id)?;
        job.handle.abort();
        tracing::debug!(job_id = %job_id, "Cleanup cancelled");
        Some(job.staged)
    }

    /// Number of armed timers.
    pub fn pending(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_pending(&self, job_id: JobId) -> bool {
        self.jobs.contains_key(&job_id)
    }

    fn spawn_timer(&self, job_id: JobId, deadline: Instant, generation: u64) -> JoinHandle<()> {
        let jobs = Arc::clone(&self.jobs);
        let artifacts = Arc::clone(&self.artifacts);

        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            let Some((_, job)) = jobs.remove_if(&job_id, |_, job| job.generation == generation)
            else {
                return;
            };

            delete_files(job_id, &job.staged, &job.artifact_name, &artifacts).await;
        })
    }
}

async fn delete_files(job_id: JobId, staged: &Path, artifact_name: &str, artifacts: &ArtifactStore) {
    if let Err(e) = remove_if_present(staged).await {
        tracing::warn!(job_id = %job_id, "Failed to delete staged input {:?}: {}", staged, e);
    }
    if let Err(e) = artifacts.expire(artifact_name).await {
        tracing::warn!(job_id = %job_id, "Failed to delete artifact {}: {}", artifact_name, e);
    }
    tracing::info!(job_id = %job_id, "Retention expired, files deleted");
}

/// Delete job files left in `dirs` by a previous process.
///
/// Their timers died with that process, so nothing else would remove them.
/// Only names owned by a job (`<job-id>.<ext>`, including `.part` outputs)
/// are touched; anything else in the directory is left alone. Missing
/// directories are skipped.
pub async fn sweep_orphans(dirs: &[&Path]) -> std::io::Result<usize> {
    let mut removed = 0;

    for dir in dirs {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let owned = entry
                .file_name()
                .to_str()
                .and_then(JobId::from_file_name)
                .is_some();
            if !owned || !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            match remove_if_present(&path).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to sweep {:?}: {}", path, e),
            }
        }
    }

    if removed > 0 {
        tracing::info!("Swept {} leftover file(s)", removed);
    }

    Ok(removed)
}
