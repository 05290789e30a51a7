//! Persistent dedup store for already-notified entries.
//!
//! The backing format is deliberately simple: an append-only text file with
//! one dedup key per line. The whole file is loaded into a `HashSet` at
//! startup; `mark_seen` appends durably (write + flush + fsync) before the
//! in-memory set is updated, so a key that was reported as marked can never
//! be re-notified after a crash.
//!
//! The store grows without bound, matching the expected item volumes. Capped
//! retention (e.g. dropping keys older than N days) is a possible extension
//! but is intentionally not implemented.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Appending a key to the store file failed. The in-memory set is still
    /// updated, so the entry may be re-notified after a restart.
    #[error("failed to append to seen store: {0}")]
    Append(#[source] std::io::Error),

    /// The store file could not be created or opened for appending.
    #[error("failed to open seen store: {0}")]
    Open(#[source] std::io::Error),
}

struct StoreInner {
    keys: HashSet<String>,
    file: File,
}

/// Thread-safe set of entry keys that have already been notified.
///
/// One mutex guards both the set and the file handle; it is held only for
/// the duration of a single `has`/`mark_seen` call, never across a network
/// fetch, so a slow feed cannot starve dedup lookups for other workers.
pub struct SeenStore {
    inner: Mutex<StoreInner>,
}

impl SeenStore {
    /// Open the store at `path`, creating the file if it does not exist.
    ///
    /// A missing or unreadable file is treated as an empty store; only
    /// failure to open the file for appending is an error.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(StoreError::Open)?;

        let mut raw = Vec::new();
        let keys = match file.read_to_end(&mut raw) {
            Ok(_) => String::from_utf8_lossy(&raw)
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect::<HashSet<_>>(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Seen store unreadable, starting empty");
                HashSet::new()
            }
        };

        tracing::info!(path = %path.display(), keys = keys.len(), "Loaded seen store");
        Ok(Self {
            inner: Mutex::new(StoreInner { keys, file }),
        })
    }

    /// Whether `key` has already been notified.
    pub fn has(&self, key: &str) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.keys.contains(key)
    }

    /// Record `key` as notified, durably.
    ///
    /// The append is flushed and fsynced before the in-memory set is updated.
    /// If the write fails the set is updated anyway and the error is
    /// returned: the entry stays suppressed for this process lifetime but may
    /// be re-notified after a restart. Marking an already-seen key is a no-op.
    pub fn mark_seen(&self, key: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        if inner.keys.contains(key) {
            return Ok(());
        }

        let write_result = writeln!(inner.file, "{}", key)
            .and_then(|_| inner.file.flush())
            .and_then(|_| inner.file.sync_data());

        inner.keys.insert(key.to_string());
        write_result.map_err(StoreError::Append)
    }

    /// Number of keys currently held. Used for startup diagnostics.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        inner.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
