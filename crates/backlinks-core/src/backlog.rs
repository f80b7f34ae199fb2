//! Background catch-up of items that were never scanned.
//!
//! A tick arms a single deferred drain guarded by a TTL lock in the shared
//! store. When the drain fires it scans one bounded batch and releases the
//! lock, so the next tick can arm another one. A drain that never fires
//! (crashed worker, lost task) is recovered once the lock expires.
//!
//! An item whose scan fails is parked: the failed version is recorded and
//! later drains move past it. Editing the item or deregistering it makes it
//! eligible for another attempt.

use crate::config::BacklogConfig;
use crate::error::Result;
use crate::metrics::{BacklogMetrics, DrainReport};
use crate::resolver::UrlResolver;
use crate::scan::ScanCoordinator;
use crate::store::{GraphStore, MetaStore, Scheduler};
use crate::types::{Item, ItemId, ScanOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every eligible item is registered.
    NoBacklog,
    /// A drain is already queued.
    AlreadyScheduled,
    /// Another worker holds the lock.
    Locked,
    /// Lock taken and a drain queued.
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogState {
    Idle,
    Pending,
    Draining,
}

impl std::fmt::Display for BacklogState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BacklogState::Idle => write!(f, "idle"),
            BacklogState::Pending => write!(f, "pending"),
            BacklogState::Draining => write!(f, "draining"),
        }
    }
}

pub struct BacklogScheduler<S: GraphStore + Scheduler, R: UrlResolver> {
    store: Arc<S>,
    scanner: Arc<ScanCoordinator<S, R>>,
    config: BacklogConfig,
    draining: AtomicBool,
    metrics: Mutex<BacklogMetrics>,
}

impl<S: GraphStore + Scheduler, R: UrlResolver> BacklogScheduler<S, R> {
    pub fn new(
        store: Arc<S>,
        scanner: Arc<ScanCoordinator<S, R>>,
        config: BacklogConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            scanner,
            config,
            draining: AtomicBool::new(false),
            metrics: Mutex::new(BacklogMetrics::new()),
        })
    }

    /// Arm a drain if there is work and nobody else has.
    pub fn tick(&self) -> Result<TickOutcome> {
        if self.pending_items()?.is_empty() {
            return Ok(TickOutcome::NoBacklog);
        }
        if self.store.is_scheduled(&self.config.task_id)? {
            return Ok(TickOutcome::AlreadyScheduled);
        }
        if !self
            .store
            .try_acquire_lock(&self.config.lock_key, self.config.lock_ttl)?
        {
            log::debug!("Backlog lock '{}' held elsewhere", self.config.lock_key);
            return Ok(TickOutcome::Locked);
        }

        self.store
            .schedule_once(self.config.delay, &self.config.task_id)?;
        log::info!(
            "Scheduled backlog drain '{}' in {:?}",
            self.config.task_id,
            self.config.delay
        );
        Ok(TickOutcome::Scheduled)
    }

    /// Run the drain if its scheduled time has come.
    pub fn fire_due(&self) -> Result<Option<DrainReport>> {
        if !self.store.take_due(&self.config.task_id)? {
            return Ok(None);
        }
        self.drain().map(Some)
    }

    /// Scan up to one batch of unregistered items. The lock is released
    /// whatever happens to the individual scans.
    pub fn drain(&self) -> Result<DrainReport> {
        self.draining.store(true, Ordering::SeqCst);
        let result = self.drain_batch();
        self.draining.store(false, Ordering::SeqCst);

        let released = self.store.release_lock(&self.config.lock_key);
        let report = result?;
        released?;

        log::info!("{}", report.summary());
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(&report, chrono::Utc::now());
        Ok(report)
    }

    fn drain_batch(&self) -> Result<DrainReport> {
        let start = Instant::now();
        let mut report = DrainReport::new();

        let batch: Vec<_> = self
            .pending_items()?
            .into_iter()
            .take(self.config.batch_size)
            .collect();

        for item in &batch {
            match self.scanner.scan(item) {
                Ok(ScanOutcome::Scanned(_)) => {
                    report.scanned += 1;
                    if let Err(e) = self.clear_failure(item.id) {
                        log::warn!("Failed to clear scan failure of item {}: {}", item.id, e);
                    }
                }
                Ok(outcome) => log::debug!("Backlog skipped item {}: {:?}", item.id, outcome),
                Err(e) => {
                    log::warn!("Backlog scan of item {} failed: {}", item.id, e);
                    report.failed.push(item.id);
                    if let Err(e) = self.park(item) {
                        log::warn!("Failed to record scan failure of item {}: {}", item.id, e);
                    }
                }
            }
        }

        report.remaining = self.pending_items()?.len() as u64;
        report.duration = start.elapsed();
        Ok(report)
    }

    /// Unregistered items a drain would pick up, ascending by id. Versions
    /// whose scan already failed are left out.
    pub fn pending_items(&self) -> Result<Vec<Item>> {
        let mut out = Vec::new();
        for item in self.scanner.unregistered_items()? {
            if !self.is_parked(&item)? {
                out.push(item);
            }
        }
        Ok(out)
    }

    fn is_parked(&self, item: &Item) -> Result<bool> {
        let failed_at = self
            .store
            .get_numeric_field(item.id, &self.config.failure_field)?;
        Ok(failed_at == Some(item.modified_at.timestamp_millis()))
    }

    fn park(&self, item: &Item) -> Result<()> {
        self.store.set_numeric_field(
            item.id,
            &self.config.failure_field,
            item.modified_at.timestamp_millis(),
        )
    }

    /// Forget a recorded scan failure so the next drain retries the item.
    pub fn clear_failure(&self, id: ItemId) -> Result<()> {
        self.store
            .delete_numeric_field(id, &self.config.failure_field)
    }

    /// Pending means a drain is queued and not yet running.
    pub fn state(&self) -> Result<BacklogState> {
        if self.draining.load(Ordering::SeqCst) {
            return Ok(BacklogState::Draining);
        }
        if self.store.is_scheduled(&self.config.task_id)? {
            return Ok(BacklogState::Pending);
        }
        Ok(BacklogState::Idle)
    }

    pub fn metrics(&self) -> BacklogMetrics {
        self.metrics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn config(&self) -> &BacklogConfig {
        &self.config
    }
}
