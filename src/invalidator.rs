//! Invalidator: periodic ETag polling plus an optional push-notification
//! listener, both converging on one idempotent purge routine.

use crate::cache::Caches;
use crate::planner::list_then_head;
use crate::store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const POLL_INTERVAL: Duration = Duration::from_secs(150);
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);
pub const ITERATION_TIMEOUT: Duration = Duration::from_secs(6);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Delete,
    Modify,
    Create,
}

#[derive(Debug, Clone)]
pub struct BucketNotification {
    pub change: ChangeKind,
    pub path: String,
    pub etag: Option<String>,
}

pub struct Invalidator {
    store: Arc<dyn ObjectStore>,
    caches: Arc<Caches>,
    poll_interval: Duration,
}

impl Invalidator {
    pub fn new(store: Arc<dyn ObjectStore>, caches: Arc<Caches>) -> Self {
        Invalidator { store, caches, poll_interval: POLL_INTERVAL.max(MIN_POLL_INTERVAL) }
    }

    /// Override the poll interval, clamped to the 60-second minimum.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Purge the archive body and index caches for `archive_name`.
    /// Idempotent: purging an already-purged key is a no-op on the
    /// underlying provider.
    pub async fn purge(&self, archive_name: &str) {
        self.caches.archives.purge(archive_name).await;
        self.caches.indexes.purge(archive_name).await;
    }

    /// Drive the push-notification channel until it closes or the task is
    /// cancelled. Single-subscriber: `rx` is consumed by this call.
    pub async fn run_push_listener(&self, mut rx: mpsc::Receiver<BucketNotification>) {
        while let Some(notification) = rx.recv().await {
            match notification.change {
                ChangeKind::Delete | ChangeKind::Modify => {
                    self.purge(&notification.path).await;
                    info!(archive = %notification.path, change = ?notification.change, "invalidator: purged on push notification");
                }
                ChangeKind::Create => {
                    // Observed but not acted on: a freshly created object
                    // has no prior cache entry to invalidate.
                }
            }
        }
    }

    /// Drive the periodic poll task until cancelled, running one cycle per
    /// tick, each cycle bounded by `ITERATION_TIMEOUT`.
    pub async fn run_periodic_poll(&self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match tokio::time::timeout(ITERATION_TIMEOUT, self.run_cycle()).await {
                Ok(()) => {}
                Err(_) => warn!("invalidator: cycle exceeded {:?} timeout, abandoning", ITERATION_TIMEOUT),
            }
        }
    }

    /// One poll cycle: the bootstrap case (ETag map empty, archive cache
    /// populated) or the steady-state conditional-GET sweep.
    async fn run_cycle(&self) {
        if self.caches.etags.is_empty() {
            let names = self.caches.archives.known_names();
            if !names.is_empty() {
                for name in names {
                    self.bootstrap_etag(&name).await;
                }
                return;
            }
        }

        for name in self.caches.etags.known_names() {
            self.poll_one(&name).await;
        }
    }

    async fn bootstrap_etag(&self, name: &str) {
        match list_then_head(self.store.as_ref(), name).await {
            Ok((stored_key, head)) => {
                if let Some(etag) = &head.etag {
                    self.caches.etags.set(name, &stored_key, etag).await;
                }
            }
            Err(e) => warn!(archive = %name, error = %e, "invalidator: bootstrap head failed"),
        }
    }

    async fn poll_one(&self, name: &str) {
        let Some(entry) = self.caches.etags.get(name).await else { return };

        let mut attempts = 0;
        let response = loop {
            attempts += 1;
            match self.store.get(&entry.stored_key, None, Some(&entry.etag)).await {
                Ok(resp) => break Some(resp),
                Err(e) if attempts < 2 => {
                    warn!(archive = %name, error = %e, "invalidator: transport error, retrying once");
                    continue;
                }
                Err(e) => {
                    warn!(archive = %name, error = %e, "invalidator: transport error, skipping cycle for this archive");
                    break None;
                }
            }
        };

        let Some(response) = response else { return };
        if response.not_modified {
            return;
        }

        self.caches.indexes.purge(name).await;
        if let Some(new_etag) = &response.etag {
            self.caches.etags.set(name, &entry.stored_key, new_etag).await;
        }

        if self.caches.archives.get(name).await.is_some() {
            self.caches.archives.set(name, response.body, None).await;
        } else {
            self.caches.archives.purge(name).await;
        }
    }
}
