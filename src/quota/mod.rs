//! Daily conversion quota.
//!
//! The counter lives in a single JSON record on disk so it survives
//! restarts. The record rolls over lazily: whenever it is consulted on a
//! different UTC calendar day from the one it was last reset on, it is reset to
//! zero first.
//!
//! Admission goes through [`QuotaStore::reserve`], which performs the
//! rollover, the limit comparison, and the in-flight bookkeeping inside one
//! critical section. A [`QuotaReservation`] holds a slot until the conversion
//! finishes: committing it bumps the persisted count, dropping it gives the
//! slot back.

use audioforge_common::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Persisted quota state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaRecord {
    /// Successful conversions in the current window.
    pub count: u32,
    /// When the window was last reset.
    pub last_reset_date: DateTime<Utc>,
}

impl QuotaRecord {
    /// A zero record whose window starts at `now`.
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            last_reset_date: now,
        }
    }

    /// Whether the record belongs to a different calendar day than `now`.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.last_reset_date.date_naive() != now.date_naive()
    }
}

/// Durable daily conversion counter.
pub struct QuotaStore {
    path: PathBuf,
    /// Conversions admitted but not yet settled. The mutex also serializes
    /// every read-modify-write of the record file.
    in_flight: Mutex<u32>,
}

impl QuotaStore {
    /// Open the store at `path`, writing a zero record if none exists.
    pub fn open(path: impl Into<PathBuf>) -> Arc<Self> {
        let store = Arc::new(Self {
            path: path.into(),
            in_flight: Mutex::new(0),
        });

        if !store.path.exists() {
            if let Some(parent) = store.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::error!("Failed to create quota directory {:?}: {}", parent, e);
                }
            }
            tracing::info!("Initializing quota record at {:?}", store.path);
            store.write(&QuotaRecord::fresh(Utc::now()));
        }

        store
    }

    /// Load the persisted record.
    ///
    /// Any read or parse failure yields a fresh zero record; the failure is
    /// logged, never returned.
    pub fn read(&self) -> QuotaRecord {
        self.read_at(Utc::now())
    }

    fn read_at(&self, now: DateTime<Utc>) -> QuotaRecord {
        match self.try_read() {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Error reading conversion count: {}", e);
                QuotaRecord::fresh(now)
            }
        }
    }

    fn try_read(&self) -> Result<QuotaRecord> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::persistence(format!("{:?}: {}", self.path, e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::persistence(format!("{:?}: {}", self.path, e)))
    }

    /// Persist a record.
    ///
    /// Failures are logged and swallowed. The file is replaced atomically so
    /// a crash mid-write never leaves a truncated record behind.
    pub fn write(&self, record: &QuotaRecord) {
        if let Err(e) = self.try_write(record) {
            tracing::error!("Error updating conversion count: {}", e);
        }
    }

    fn try_write(&self, record: &QuotaRecord) -> Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| Error::persistence(format!("serialize quota record: {}", e)))?;

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        std::fs::write(&tmp, json)
            .and_then(|_| std::fs::rename(&tmp, &self.path))
            .map_err(|e| {
                let _ = std::fs::remove_file(&tmp);
                Error::persistence(format!("{:?}: {}", self.path, e))
            })
    }

    /// Persisted record as-is, without the day rollover (quota query).
    pub fn snapshot(&self) -> QuotaRecord {
        let _guard = self.in_flight.lock();
        self.read()
    }

    /// Roll the window over if the record is from a previous day and return
    /// the count to compare against the daily limit.
    ///
    /// Within one day repeated calls never reset; after a day boundary the
    /// first call resets and later ones see the fresh record.
    pub fn check_and_reset(&self) -> u32 {
        let _guard = self.in_flight.lock();
        self.rollover(Utc::now()).count
    }

    /// Caller must hold `in_flight`.
    fn rollover(&self, now: DateTime<Utc>) -> QuotaRecord {
        let record = self.read_at(now);
        if record.is_stale(now) {
            tracing::info!(
                previous_count = record.count,
                "New quota day, resetting conversion count"
            );
            let fresh = QuotaRecord::fresh(now);
            self.write(&fresh);
            fresh
        } else {
            record
        }
    }

    /// Admit one conversion if the daily limit allows it.
    ///
    /// In-flight reservations count against the limit, so concurrent
    /// requests can never collectively pass a stale check.
    ///
    /// # Errors
    ///
    /// Returns [`Error::QuotaExceeded`] when `count + in_flight >= limit`.
    pub fn reserve(self: &Arc<Self>, limit: u32) -> Result<QuotaReservation> {
        self.reserve_at(limit, Utc::now())
    }

    fn reserve_at(self: &Arc<Self>, limit: u32, now: DateTime<Utc>) -> Result<QuotaReservation> {
        let mut in_flight = self.in_flight.lock();
        let record = self.rollover(now);

        if record.count.saturating_add(*in_flight) >= limit {
            tracing::info!(
                count = record.count,
                in_flight = *in_flight,
                limit,
                "Daily conversion limit reached"
            );
            return Err(Error::QuotaExceeded { limit });
        }

        *in_flight += 1;
        tracing::debug!(count = record.count, in_flight = *in_flight, limit, "Quota slot reserved");

        Ok(QuotaReservation {
            store: Arc::clone(self),
            settled: false,
        })
    }

    /// Number of admitted conversions that have not settled yet.
    pub fn in_flight(&self) -> u32 {
        *self.in_flight.lock()
    }

    /// Caller must hold `in_flight`.
    fn increment(&self, now: DateTime<Utc>) -> QuotaRecord {
        let mut record = self.rollover(now);
        record.count += 1;
        self.write(&record);
        record
    }
}

/// An admitted conversion's hold on one quota slot.
///
/// Call [`commit`](QuotaReservation::commit) once the conversion succeeded.
/// Dropping the reservation without committing releases the slot and leaves
/// the count unchanged.
#[must_use = "dropping a reservation releases the quota slot"]
pub struct QuotaReservation {
    store: Arc<QuotaStore>,
    settled: bool,
}

impl QuotaReservation {
    /// Count the conversion: increment and persist the record.
    pub fn commit(self) -> QuotaRecord {
        self.commit_at(Utc::now())
    }

    fn commit_at(mut self, now: DateTime<Utc>) -> QuotaRecord {
        let mut in_flight = self.store.in_flight.lock();
        let record = self.store.increment(now);
        *in_flight = in_flight.saturating_sub(1);
        self.settled = true;
        tracing::debug!(count = record.count, "Conversion counted");
        record
    }
}

impl Drop for QuotaReservation {
    fn drop(&mut self) {
        if !self.settled {
            let mut in_flight = self.store.in_flight.lock();
            *in_flight = in_flight.saturating_sub(1);
            tracing::debug!(in_flight = *in_flight, "Quota slot released");
        }
    }
}
