use crate::error::{BacklinksError, Result};
use crate::store::clock::{Clock, SystemClock};
use crate::store::filters::ItemFilter;
use crate::store::traits::{ItemCatalog, MetaStore, Scheduler, TagStore};
use crate::types::{Item, ItemId, Taxonomy};
use redb::{Database, MultimapTableDefinition, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// Table definitions
const ITEMS: TableDefinition<u64, &[u8]> = TableDefinition::new("items");
const ITEMS_BY_SLUG: TableDefinition<&str, u64> = TableDefinition::new("items_by_slug");
const TAXONOMIES: TableDefinition<&str, &[u8]> = TableDefinition::new("taxonomies");

// Label assignments, kept in both directions so reverse lookups are index scans
const ITEM_LABELS: MultimapTableDefinition<(&str, u64), &str> =
    MultimapTableDefinition::new("item_labels");
const LABEL_ITEMS: MultimapTableDefinition<(&str, &str), u64> =
    MultimapTableDefinition::new("label_items");

const NUMERIC_META: TableDefinition<(u64, &str), i64> = TableDefinition::new("numeric_meta");

// Lock expiry and task due times, milliseconds since the epoch
const LOCKS: TableDefinition<&str, i64> = TableDefinition::new("locks");
const TASKS: TableDefinition<&str, i64> = TableDefinition::new("tasks");

const META: TableDefinition<&str, &[u8]> = TableDefinition::new("meta");

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Redb-backed implementation of every store collaborator.
pub struct RedbStore {
    db: Arc<Database>,
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl RedbStore {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// Open with an explicit clock for lock and task timing
    pub fn open_with_clock<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                BacklinksError::Validation(format!("Failed to create directory: {}", e))
            })?;
        }

        let is_new = !path.exists();
        let db = Database::create(&path)?;

        if !is_new {
            Self::check_schema_version(&db)?;
        }

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ITEMS)?;
            let _ = write_txn.open_table(ITEMS_BY_SLUG)?;
            let _ = write_txn.open_table(TAXONOMIES)?;
            let _ = write_txn.open_multimap_table(ITEM_LABELS)?;
            let _ = write_txn.open_multimap_table(LABEL_ITEMS)?;
            let _ = write_txn.open_table(NUMERIC_META)?;
            let _ = write_txn.open_table(LOCKS)?;
            let _ = write_txn.open_table(TASKS)?;
            let mut meta = write_txn.open_table(META)?;
            if is_new {
                meta.insert(SCHEMA_VERSION_KEY, CURRENT_SCHEMA_VERSION.to_string().as_bytes())?;
            }
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            path,
            clock,
        })
    }

    fn check_schema_version(db: &Database) -> Result<()> {
        let read_txn = db.begin_read()?;
        let version = {
            let table = read_txn.open_table(META).ok();
            table
                .and_then(|t| {
                    t.get(SCHEMA_VERSION_KEY).ok().flatten().and_then(|v| {
                        std::str::from_utf8(v.value())
                            .ok()
                            .and_then(|s| s.parse::<u32>().ok())
                    })
                })
                .unwrap_or(CURRENT_SCHEMA_VERSION)
        };

        if version > CURRENT_SCHEMA_VERSION {
            return Err(BacklinksError::Validation(format!(
                "Database schema v{} is newer than this binary v{}. Upgrade backlinks.",
                version, CURRENT_SCHEMA_VERSION
            )));
        }
        Ok(())
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    fn now_millis(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    fn serialize_item(item: &Item) -> Result<Vec<u8>> {
        bincode::serialize(item).map_err(BacklinksError::from)
    }

    fn deserialize_item(bytes: &[u8]) -> Result<Item> {
        bincode::deserialize(bytes).map_err(BacklinksError::from)
    }
}

impl ItemCatalog for RedbStore {
    fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ITEMS)?;
        match table.get(id.0)? {
            Some(bytes) => Ok(Some(Self::deserialize_item(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn put_item(&self, item: &Item) -> Result<()> {
        item.validate().map_err(BacklinksError::Validation)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut items = write_txn.open_table(ITEMS)?;
            let old = items
                .get(item.id.0)?
                .map(|guard| Self::deserialize_item(guard.value()))
                .transpose()?;

            let bytes = Self::serialize_item(item)?;
            items.insert(item.id.0, bytes.as_slice())?;

            let mut slugs = write_txn.open_table(ITEMS_BY_SLUG)?;
            if let Some(old) = old {
                if old.slug != item.slug {
                    slugs.remove(old.slug.as_str())?;
                }
            }
            slugs.insert(item.slug.as_str(), item.id.0)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn item_by_slug(&self, slug: &str) -> Result<Option<Item>> {
        let id = {
            let read_txn = self.db.begin_read()?;
            let slugs = read_txn.open_table(ITEMS_BY_SLUG)?;
            let id = slugs.get(slug)?.map(|guard| guard.value());
            id
        };
        match id {
            Some(id) => self.get_item(ItemId(id)),
            None => Ok(None),
        }
    }

    fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ITEMS)?;

        let mut out = Vec::new();
        if let Some(ref ids) = filter.ids {
            let mut ids = ids.clone();
            ids.sort();
            ids.dedup();
            for id in ids {
                if let Some(bytes) = table.get(id.0)? {
                    let item = Self::deserialize_item(bytes.value())?;
                    if filter.matches(&item) {
                        out.push(item);
                    }
                }
            }
        } else {
            for entry in table.iter()? {
                let (_, bytes) = entry?;
                let item = Self::deserialize_item(bytes.value())?;
                if filter.matches(&item) {
                    out.push(item);
                }
            }
        }

        Ok(out)
    }

    fn count_items(&self, filter: &ItemFilter) -> Result<u64> {
        Ok(self.list_items(filter)?.len() as u64)
    }
}

impl TagStore for RedbStore {
    fn register_taxonomy(&self, taxonomy: &Taxonomy) -> Result<()> {
        let bytes = bincode::serialize(taxonomy)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(TAXONOMIES)?;
            table.insert(taxonomy.id.as_str(), bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn assign_labels(&self, item: ItemId, taxonomy: &str, labels: &[String]) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let taxonomies = write_txn.open_table(TAXONOMIES)?;
            if taxonomies.get(taxonomy)?.is_none() {
                return Err(BacklinksError::UnknownTaxonomy(taxonomy.to_string()));
            }
        }
        {
            let mut item_labels = write_txn.open_multimap_table(ITEM_LABELS)?;
            let mut label_items = write_txn.open_multimap_table(LABEL_ITEMS)?;

            let old: Vec<String> = {
                let mut old = Vec::new();
                for label in item_labels.remove_all((taxonomy, item.0))? {
                    old.push(label?.value().to_string());
                }
                old
            };
            for label in &old {
                label_items.remove((taxonomy, label.as_str()), item.0)?;
            }

            for label in labels {
                item_labels.insert((taxonomy, item.0), label.as_str())?;
                label_items.insert((taxonomy, label.as_str()), item.0)?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    fn labels_of(&self, item: ItemId, taxonomy: &str) -> Result<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_multimap_table(ITEM_LABELS)?;
        let mut out = Vec::new();
        for label in table.get((taxonomy, item.0))? {
            out.push(label?.value().to_string());
        }
        Ok(out)
    }

    fn items_with_label(&self, taxonomy: &str, label: &str) -> Result<Vec<ItemId>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_multimap_table(LABEL_ITEMS)?;
        let mut out = Vec::new();
        for id in table.get((taxonomy, label))? {
            out.push(ItemId(id?.value()));
        }
        Ok(out)
    }

    fn label_usage_count(&self, taxonomy: &str, label: &str) -> Result<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_multimap_table(LABEL_ITEMS)?;
        let mut count = 0;
        for id in table.get((taxonomy, label))? {
            id?;
            count += 1;
        }
        Ok(count)
    }

    fn taxonomies_applicable_to(&self, kind: &str) -> Result<Vec<Taxonomy>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TAXONOMIES)?;
        let mut out = Vec::new();
        for entry in table.iter()? {
            let (_, bytes) = entry?;
            let taxonomy: Taxonomy = bincode::deserialize(bytes.value())?;
            if taxonomy.applies_to(kind) {
                out.push(taxonomy);
            }
        }
        Ok(out)
    }
}

impl MetaStore for RedbStore {
    fn get_numeric_field(&self, item: ItemId, key: &str) -> Result<Option<i64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(NUMERIC_META)?;
        let value = table.get((item.0, key))?.map(|v| v.value());
        Ok(value)
    }

    fn set_numeric_field(&self, item: ItemId, key: &str, value: i64) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(NUMERIC_META)?;
            table.insert((item.0, key), value)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn delete_numeric_field(&self, item: ItemId, key: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(NUMERIC_META)?;
            table.remove((item.0, key))?;
        }
        write_txn.commit()?;
        Ok(())
    }
}

impl Scheduler for RedbStore {
    fn try_acquire_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = self.now_millis();
        let expires = now.saturating_add(ttl.as_millis().min(i64::MAX as u128) as i64);

        let write_txn = self.db.begin_write()?;
        let acquired = {
            let mut locks = write_txn.open_table(LOCKS)?;
            let held = locks.get(key)?.map(|v| v.value() > now).unwrap_or(false);
            if !held {
                locks.insert(key, expires)?;
            }
            !held
        };
        write_txn.commit()?;
        Ok(acquired)
    }

    fn release_lock(&self, key: &str) -> Result<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut locks = write_txn.open_table(LOCKS)?;
            locks.remove(key)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn schedule_once(&self, delay: Duration, task_id: &str) -> Result<()> {
        let due = self
            .now_millis()
            .saturating_add(delay.as_millis().min(i64::MAX as u128) as i64);
        let write_txn = self.db.begin_write()?;
        {
            let mut tasks = write_txn.open_table(TASKS)?;
            tasks.insert(task_id, due)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn is_scheduled(&self, task_id: &str) -> Result<bool> {
        let read_txn = self.db.begin_read()?;
        let tasks = read_txn.open_table(TASKS)?;
        let scheduled = tasks.get(task_id)?.is_some();
        Ok(scheduled)
    }

    fn take_due(&self, task_id: &str) -> Result<bool> {
        let now = self.now_millis();
        let write_txn = self.db.begin_write()?;
        let due = {
            let mut tasks = write_txn.open_table(TASKS)?;
            let due = tasks.get(task_id)?.map(|v| v.value() <= now).unwrap_or(false);
            if due {
                tasks.remove(task_id)?;
            }
            due
        };
        write_txn.commit()?;
        Ok(due)
    }
}
