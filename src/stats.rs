//! Delivery counters, persisted as TOML next to the seen store.
//!
//! Tracks how many notifications went out today (UTC) and overall. Counts
//! are best-effort: a failed persist is logged and the process carries on.

use crate::notify::{Notification, Notifier, NotifyError};
use chrono::Utc;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Counters {
    day: String,
    today: u64,
    total: u64,
}

/// Sent-message counters with daily rollover at UTC midnight.
pub struct Stats {
    path: PathBuf,
    inner: Mutex<Counters>,
}

impl Stats {
    /// Open counters at `path`. Missing or unparseable state starts at zero.
    pub fn open(path: &Path) -> Self {
        let counters = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default();
        Self {
            path: path.to_path_buf(),
            inner: Mutex::new(counters),
        }
    }

    /// Count one delivered notification and persist.
    pub fn record_sent(&self) {
        let mut counters = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let today = Utc::now().format("%Y-%m-%d").to_string();
        if counters.day != today {
            counters.day = today;
            counters.today = 0;
        }
        counters.today += 1;
        counters.total += 1;

        match toml::to_string(&*counters) {
            Ok(serialized) => {
                if let Err(e) = std::fs::write(&self.path, serialized) {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to persist stats");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize stats");
            }
        }
    }

    /// (today, total) delivered counts.
    pub fn snapshot(&self) -> (u64, u64) {
        let counters = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let today_count = if counters.day == today {
            counters.today
        } else {
            0
        };
        (today_count, counters.total)
    }
}

/// Notifier decorator that counts successful deliveries.
pub struct StatsNotifier {
    inner: Arc<dyn Notifier>,
    stats: Arc<Stats>,
}

impl StatsNotifier {
    pub fn new(inner: Arc<dyn Notifier>, stats: Arc<Stats>) -> Self {
        Self { inner, stats }
    }
}

impl Notifier for StatsNotifier {
    fn notify(&self, note: Notification) -> BoxFuture<'_, Result<(), NotifyError>> {
        Box::pin(async move {
            let result = self.inner.notify(note).await;
            if result.is_ok() {
                self.stats.record_sent();
            }
            result
        })
    }
}
