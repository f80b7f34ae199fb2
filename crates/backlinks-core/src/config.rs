use crate::error::{BacklinksError, Result};
use crate::store::ItemFilter;
use crate::types::Item;
use std::time::Duration;

/// Which items the graph tracks and where it keeps its bookkeeping.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Item types that are scanned and linked. Default: post, page.
    pub item_types: Vec<String>,

    /// Statuses that are scanned. Default: publish, future.
    pub statuses: Vec<String>,

    /// Status counted as "published" for the over-common term threshold.
    pub published_status: String,

    /// Taxonomy holding one synthetic label per outgoing edge.
    pub backlink_taxonomy: String,

    /// Taxonomy holding the coarse backlink count bucket.
    pub count_taxonomy: String,

    /// Numeric field with the exact backlink count, used for sorting.
    pub count_field: String,

    /// Numeric field with the modification time of the last scan (millis).
    pub scan_field: String,

    /// Terms used by at least published_count / divisor items are ignored
    /// when gathering suggestion candidates. Default: 3.
    pub over_common_divisor: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            item_types: vec!["post".into(), "page".into()],
            statuses: vec!["publish".into(), "future".into()],
            published_status: "publish".into(),
            backlink_taxonomy: "backlink".into(),
            count_taxonomy: "backlink_count".into(),
            count_field: "_backlinks_count".into(),
            scan_field: "_backlinks_scanned_at".into(),
            over_common_divisor: 3,
        }
    }
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item_types(mut self, types: &[&str]) -> Self {
        self.item_types = types.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_statuses(mut self, statuses: &[&str]) -> Self {
        self.statuses = statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_over_common_divisor(mut self, divisor: u64) -> Self {
        self.over_common_divisor = divisor;
        self
    }

    pub fn kind_ok(&self, kind: &str) -> bool {
        self.item_types.iter().any(|t| t == kind)
    }

    pub fn status_ok(&self, status: &str) -> bool {
        self.statuses.iter().any(|s| s == status)
    }

    pub fn is_eligible(&self, item: &Item) -> bool {
        self.kind_ok(&item.kind) && self.status_ok(&item.status)
    }

    /// Filter selecting every tracked item.
    pub fn eligible_filter(&self) -> ItemFilter {
        ItemFilter::new()
            .with_kinds(&self.item_types)
            .with_statuses(&self.statuses)
    }

    pub fn validate(&self) -> Result<()> {
        if self.item_types.is_empty() {
            return Err(BacklinksError::Validation("item_types must not be empty".into()));
        }

        if self.statuses.is_empty() {
            return Err(BacklinksError::Validation("statuses must not be empty".into()));
        }

        if self.backlink_taxonomy == self.count_taxonomy {
            return Err(BacklinksError::Validation(
                "backlink_taxonomy and count_taxonomy must differ".into(),
            ));
        }

        if self.count_field == self.scan_field {
            return Err(BacklinksError::Validation(
                "count_field and scan_field must differ".into(),
            ));
        }

        if self.over_common_divisor == 0 {
            return Err(BacklinksError::Validation(
                "over_common_divisor must be > 0".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration for the backlog scheduler
#[derive(Debug, Clone)]
pub struct BacklogConfig {
    /// Lock guarding against more than one pending drain.
    pub lock_key: String,

    /// Identifier of the deferred drain task.
    pub task_id: String,

    /// Lock lifetime. Must exceed a drain's run time. Default: 30 minutes.
    pub lock_ttl: Duration,

    /// Debounce delay before a scheduled drain fires. Default: 60 seconds.
    pub delay: Duration,

    /// Maximum items scanned per drain. Default: 20.
    pub batch_size: usize,

    /// Numeric field holding the modification time (millis) of an item
    /// version whose backlog scan failed. Drains skip that version.
    pub failure_field: String,
}

impl Default for BacklogConfig {
    fn default() -> Self {
        Self {
            lock_key: "backlinks-backlog-lock".into(),
            task_id: "backlinks_backlog".into(),
            lock_ttl: Duration::from_secs(30 * 60),
            delay: Duration::from_secs(60),
            batch_size: 20,
            failure_field: "_backlinks_scan_failed_at".into(),
        }
    }
}

impl BacklogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(mut self, lock_key: &str, task_id: &str) -> Self {
        self.lock_key = lock_key.to_string();
        self.task_id = task_id.to_string();
        self
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BacklinksError::Validation("batch_size must be > 0".into()));
        }

        if self.lock_ttl <= self.delay {
            return Err(BacklinksError::Validation(
                "lock_ttl must be longer than delay".into(),
            ));
        }

        if self.lock_key.is_empty() || self.task_id.is_empty() {
            return Err(BacklinksError::Validation(
                "lock_key and task_id must not be empty".into(),
            ));
        }

        if self.failure_field.is_empty() {
            return Err(BacklinksError::Validation(
                "failure_field must not be empty".into(),
            ));
        }

        Ok(())
    }
}
