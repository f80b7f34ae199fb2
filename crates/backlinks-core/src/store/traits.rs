use crate::error::Result;
use crate::store::filters::ItemFilter;
use crate::types::{Item, ItemId, Taxonomy};
use std::time::Duration;

/// Generic label store: assigns labels (terms) to items per taxonomy and
/// answers "which items carry this label".
pub trait TagStore: Send + Sync {
    /// Register (or replace) a taxonomy descriptor.
    fn register_taxonomy(&self, taxonomy: &Taxonomy) -> Result<()>;

    /// Replace the labels of `item` in `taxonomy` with exactly `labels`.
    fn assign_labels(&self, item: ItemId, taxonomy: &str, labels: &[String]) -> Result<()>;

    /// Labels of `item` in `taxonomy`, in label order.
    fn labels_of(&self, item: ItemId, taxonomy: &str) -> Result<Vec<String>>;

    /// Items carrying `label` in `taxonomy`, in ascending id order.
    fn items_with_label(&self, taxonomy: &str, label: &str) -> Result<Vec<ItemId>>;

    /// Number of items carrying `label` in `taxonomy`.
    fn label_usage_count(&self, taxonomy: &str, label: &str) -> Result<u64>;

    /// Taxonomies whose object types include `kind`, in id order.
    fn taxonomies_applicable_to(&self, kind: &str) -> Result<Vec<Taxonomy>>;
}

/// Per-item numeric metadata.
pub trait MetaStore: Send + Sync {
    fn get_numeric_field(&self, item: ItemId, key: &str) -> Result<Option<i64>>;

    fn set_numeric_field(&self, item: ItemId, key: &str, value: i64) -> Result<()>;

    /// Removing an absent field is not an error.
    fn delete_numeric_field(&self, item: ItemId, key: &str) -> Result<()>;
}

/// Read access to the content items the graph is built over.
pub trait ItemCatalog: Send + Sync {
    fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    /// Insert or update an item.
    fn put_item(&self, item: &Item) -> Result<()>;

    fn item_by_slug(&self, slug: &str) -> Result<Option<Item>>;

    /// Items matching the filter, in ascending id order.
    fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>>;

    fn count_items(&self, filter: &ItemFilter) -> Result<u64>;
}

/// Cross-request locks with a time-to-live, and one-shot deferred tasks.
pub trait Scheduler: Send + Sync {
    /// Take the lock unless someone holds an unexpired one.
    fn try_acquire_lock(&self, key: &str, ttl: Duration) -> Result<bool>;

    fn release_lock(&self, key: &str) -> Result<()>;

    /// Schedule `task_id` to become due after `delay`. Replaces an existing
    /// schedule for the same task.
    fn schedule_once(&self, delay: Duration, task_id: &str) -> Result<()>;

    fn is_scheduled(&self, task_id: &str) -> Result<bool>;

    /// Remove and report `task_id` if it is due now.
    fn take_due(&self, task_id: &str) -> Result<bool>;
}

/// Everything the graph engine needs from its backing store.
pub trait GraphStore: TagStore + MetaStore + ItemCatalog {}

impl<T: TagStore + MetaStore + ItemCatalog> GraphStore for T {}
