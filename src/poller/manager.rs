//! Worker set and live reconfiguration.
//!
//! The manager owns one worker per feed group and applies configuration
//! changes as a diff: removed groups are stopped and joined, changed groups
//! are reconfigured in place, new groups are spawned. Unaffected workers are
//! never touched. Diff computation is a pure function over two configuration
//! snapshots so it can be tested without I/O.

use crate::config::{validate_groups, ConfigError, FeedGroupConfig};
use crate::feed::EntrySource;
use crate::notify::Notifier;
use crate::poller::worker::{spawn_worker, WorkerContext, WorkerHandle};
use crate::store::SeenStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Result of comparing two configuration snapshots by group label.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct GroupDiff {
    /// Groups present only in the new snapshot, in new-snapshot order.
    pub added: Vec<FeedGroupConfig>,
    /// Labels present only in the old snapshot, in old-snapshot order.
    pub removed: Vec<String>,
    /// Groups present in both whose config differs, in new-snapshot order.
    pub changed: Vec<FeedGroupConfig>,
}

/// Pure diff over two snapshots. Groups with identical config appear in
/// neither list and their workers receive no command.
pub fn diff_groups(old: &[FeedGroupConfig], new: &[FeedGroupConfig]) -> GroupDiff {
    let old_by_label: HashMap<&str, &FeedGroupConfig> =
        old.iter().map(|g| (g.group.as_str(), g)).collect();
    let new_labels: std::collections::HashSet<&str> =
        new.iter().map(|g| g.group.as_str()).collect();

    let mut diff = GroupDiff::default();
    for group in new {
        match old_by_label.get(group.group.as_str()) {
            None => diff.added.push(group.clone()),
            Some(existing) if *existing != group => diff.changed.push(group.clone()),
            Some(_) => {}
        }
    }
    for group in old {
        if !new_labels.contains(group.group.as_str()) {
            diff.removed.push(group.group.clone());
        }
    }
    diff
}

/// What a reconfiguration actually did, for logging and assertions.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DiffSummary {
    pub started: usize,
    pub stopped: usize,
    pub reconfigured: usize,
}

struct ManagerState {
    groups: Vec<FeedGroupConfig>,
    workers: HashMap<String, WorkerHandle>,
}

/// Owns the set of feed workers.
///
/// `update_feeds` calls are serialized by one async mutex so concurrent
/// reconfigurations cannot interleave; an in-progress fetch cycle of an
/// unrelated worker is never blocked by it.
pub struct Manager {
    ctx: WorkerContext,
    state: Mutex<ManagerState>,
}

impl Manager {
    pub fn new(
        source: Arc<dyn EntrySource>,
        store: Arc<SeenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            ctx: WorkerContext {
                source,
                store,
                notifier,
            },
            state: Mutex::new(ManagerState {
                groups: Vec::new(),
                workers: HashMap::new(),
            }),
        }
    }

    /// Spawn workers for the initial configuration.
    pub async fn start(&self, initial: Vec<FeedGroupConfig>) -> Result<DiffSummary, ConfigError> {
        let summary = self.update_feeds(initial).await?;
        tracing::info!(groups = summary.started, "Feed manager started");
        Ok(summary)
    }

    /// Apply a new configuration snapshot.
    ///
    /// The snapshot is validated first; on validation failure nothing
    /// changes and the previous configuration remains active. Stopped
    /// workers are joined before this returns, so their final cycle
    /// (including store writes) has completed.
    pub async fn update_feeds(
        &self,
        new_groups: Vec<FeedGroupConfig>,
    ) -> Result<DiffSummary, ConfigError> {
        validate_groups(&new_groups)?;

        let mut state = self.state.lock().await;
        let diff = diff_groups(&state.groups, &new_groups);
        let mut summary = DiffSummary::default();

        for label in &diff.removed {
            if let Some(handle) = state.workers.remove(label) {
                handle.stop().await;
                summary.stopped += 1;
                tracing::info!(group = %label, "Feed group removed");
            }
        }

        for cfg in &diff.changed {
            if let Some(handle) = state.workers.get(&cfg.group) {
                handle.reconfigure(cfg.clone());
                summary.reconfigured += 1;
            }
        }

        for cfg in diff.added {
            let label = cfg.group.clone();
            let handle = spawn_worker(cfg, self.ctx.clone());
            state.workers.insert(label.clone(), handle);
            summary.started += 1;
            tracing::info!(group = %label, "Feed group added");
        }

        state.groups = new_groups;
        tracing::info!(
            started = summary.started,
            stopped = summary.stopped,
            reconfigured = summary.reconfigured,
            "Feed configuration applied"
        );
        Ok(summary)
    }

    /// Stop every worker and wait for their in-flight cycles to finish.
    pub async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        let workers: Vec<WorkerHandle> = state.workers.drain().map(|(_, h)| h).collect();
        state.groups.clear();
        for handle in workers {
            handle.stop().await;
        }
        tracing::info!("Feed manager stopped");
    }

    /// Labels of currently running groups, sorted. For diagnostics and tests.
    pub async fn active_groups(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut labels: Vec<String> = state.workers.keys().cloned().collect();
        labels.sort();
        labels
    }
}
