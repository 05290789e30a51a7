//! One polling task per feed group.
//!
//! A worker owns its group's schedule: an immediate first cycle on start,
//! then one cycle per interval tick. Cycles never overlap — the next tick is
//! armed only after the current cycle, including store writes, completes.
//!
//! Commands arrive on an unbounded channel. `Stop` is honored between URLs
//! and between cycles, never mid-fetch, so dedup writes are not torn.
//! `Reconfigure` is applied only between cycles; a command that lands
//! mid-cycle is stashed and applied when the cycle ends. An interval change
//! resets the timer to `now + new_interval` (phase is not preserved);
//! keyword and URL changes simply take effect on the next tick.

use crate::config::FeedGroupConfig;
use crate::feed::EntrySource;
use crate::matcher::match_entry;
use crate::notify::{Notification, Notifier};
use crate::store::SeenStore;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Shared collaborators handed to every worker at spawn time.
#[derive(Clone)]
pub struct WorkerContext {
    pub source: Arc<dyn EntrySource>,
    pub store: Arc<SeenStore>,
    pub notifier: Arc<dyn Notifier>,
}

pub(crate) enum WorkerCommand {
    Reconfigure(FeedGroupConfig),
    Stop,
}

/// Manager-side handle to a running worker.
pub(crate) struct WorkerHandle {
    tx: UnboundedSender<WorkerCommand>,
    join: JoinHandle<()>,
}

impl WorkerHandle {
    pub(crate) fn reconfigure(&self, cfg: FeedGroupConfig) {
        let _ = self.tx.send(WorkerCommand::Reconfigure(cfg));
    }

    /// Signal cooperative stop and wait for the in-flight cycle to finish.
    pub(crate) async fn stop(self) {
        let _ = self.tx.send(WorkerCommand::Stop);
        if let Err(e) = self.join.await {
            tracing::warn!(error = %e, "Worker task panicked during shutdown");
        }
    }
}

pub(crate) fn spawn_worker(cfg: FeedGroupConfig, ctx: WorkerContext) -> WorkerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let worker = Worker {
        cfg,
        ctx,
        last_success: HashMap::new(),
        rx,
    };
    let join = tokio::spawn(worker.run());
    WorkerHandle { tx, join }
}

enum CycleEnd {
    /// Cycle completed; a reconfiguration may have arrived mid-cycle.
    Continue(Option<FeedGroupConfig>),
    Stop,
}

struct Worker {
    cfg: FeedGroupConfig,
    ctx: WorkerContext,
    /// Last successful fetch per URL, for diagnostics.
    last_success: HashMap<String, DateTime<Utc>>,
    rx: UnboundedReceiver<WorkerCommand>,
}

impl Worker {
    async fn run(mut self) {
        tracing::info!(
            group = %self.cfg.group,
            urls = self.cfg.urls.len(),
            interval_secs = self.cfg.interval().as_secs(),
            "Worker started"
        );

        loop {
            match self.run_cycle().await {
                CycleEnd::Stop => break,
                CycleEnd::Continue(pending) => {
                    if let Some(new_cfg) = pending {
                        self.apply_config(new_cfg);
                    }
                }
            }

            let sleep = tokio::time::sleep(self.cfg.interval());
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    cmd = self.rx.recv() => match cmd {
                        Some(WorkerCommand::Reconfigure(new_cfg)) => {
                            let interval_changed = new_cfg.interval() != self.cfg.interval();
                            self.apply_config(new_cfg);
                            if interval_changed {
                                sleep.as_mut().reset(
                                    tokio::time::Instant::now() + self.cfg.interval(),
                                );
                            }
                        }
                        Some(WorkerCommand::Stop) | None => {
                            tracing::info!(group = %self.cfg.group, "Worker stopped");
                            return;
                        }
                    }
                }
            }
        }

        tracing::info!(group = %self.cfg.group, "Worker stopped");
    }

    fn apply_config(&mut self, new_cfg: FeedGroupConfig) {
        tracing::info!(
            group = %new_cfg.group,
            urls = new_cfg.urls.len(),
            interval_secs = new_cfg.interval().as_secs(),
            "Worker reconfigured"
        );
        self.cfg = new_cfg;
    }

    /// One fetch-match-filter-notify pass over all URLs in the group.
    async fn run_cycle(&mut self) -> CycleEnd {
        let mut pending = None;
        let urls = self.cfg.urls.clone();

        for url in &urls {
            // Drain commands between URLs: stop immediately, but hold any
            // reconfiguration until the cycle ends.
            loop {
                match self.rx.try_recv() {
                    Ok(WorkerCommand::Stop) | Err(TryRecvError::Disconnected) => {
                        return CycleEnd::Stop;
                    }
                    Ok(WorkerCommand::Reconfigure(cfg)) => pending = Some(cfg),
                    Err(TryRecvError::Empty) => break,
                }
            }

            self.poll_url(url).await;
        }

        CycleEnd::Continue(pending)
    }

    async fn poll_url(&mut self, url: &str) {
        let entries = match self.ctx.source.fetch(url).await {
            Ok(entries) => entries,
            Err(e) => {
                // One bad URL never blocks its siblings; the next tick retries.
                tracing::warn!(group = %self.cfg.group, url = %url, error = %e, "Fetch failed");
                return;
            }
        };
        self.last_success.insert(url.to_string(), Utc::now());

        let mut delivered = 0usize;
        for entry in entries {
            let (matched, matched_keywords) = match_entry(
                &entry.title,
                &self.cfg.keywords,
                self.cfg.allow_partial_match,
            );
            if !matched || self.ctx.store.has(&entry.dedup_key) {
                continue;
            }

            let note = Notification {
                title: entry.title,
                link: entry.link,
                group: self.cfg.group.clone(),
                published: entry.published,
                matched_keywords,
            };
            match self.ctx.notifier.notify(note).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    // Still marked seen below: no redelivery guarantee, no
                    // duplicate spam.
                    tracing::warn!(
                        group = %self.cfg.group,
                        url = %url,
                        key = %entry.dedup_key,
                        error = %e,
                        "Notification failed"
                    );
                }
            }

            if let Err(e) = self.ctx.store.mark_seen(&entry.dedup_key) {
                tracing::warn!(
                    group = %self.cfg.group,
                    url = %url,
                    key = %entry.dedup_key,
                    error = %e,
                    "Seen key not persisted, entry may repeat after restart"
                );
            }
        }

        if delivered > 0 {
            tracing::info!(group = %self.cfg.group, url = %url, delivered, "Delivered new entries");
        } else {
            tracing::debug!(group = %self.cfg.group, url = %url, "No new entries");
        }
    }
}
