//! Typed ID wrappers.
//!
//! A [`JobId`] names one conversion request end to end: the staged upload,
//! the converted artifact, and the cleanup job all share it. IDs are UUIDv7,
//! so they embed a millisecond timestamp and sort in creation order while
//! staying collision resistant across concurrent requests.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a conversion job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new time-ordered job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// File name for a file belonging to this job with the given extension.
    ///
    /// The extension may be given with or without the leading dot; an empty
    /// extension yields the bare ID.
    pub fn file_name(&self, extension: &str) -> String {
        let ext = extension.trim_start_matches('.');
        if ext.is_empty() {
            self.0.to_string()
        } else {
            format!("{}.{}", self.0, ext)
        }
    }

    /// Job that owns a file named by [`JobId::file_name`], with or without
    /// further suffixes (`<id>.mp3.part` belongs to `<id>` too).
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.split_once('.').map_or(name, |(stem, _)| stem);
        stem.parse().ok()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<JobId> for Uuid {
    fn from(id: JobId) -> Self {
        id.0
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
