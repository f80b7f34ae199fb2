use crate::config::GraphConfig;
use crate::edges::EdgeStore;
use crate::error::Result;
use crate::store::GraphStore;
use crate::types::{CountBucket, CountLabel, ItemId};
use std::sync::Arc;

/// Keeps each item's backlink count label and numeric count in line with
/// its incoming edges.
pub struct CountLabels<S: GraphStore> {
    store: Arc<S>,
    edges: Arc<EdgeStore<S>>,
    config: GraphConfig,
}

impl<S: GraphStore> CountLabels<S> {
    pub fn new(store: Arc<S>, edges: Arc<EdgeStore<S>>, config: GraphConfig) -> Self {
        Self {
            store,
            edges,
            config,
        }
    }

    /// Recount incoming edges of `item` from tracked sources and store the
    /// bucket label and exact count.
    pub fn refresh(&self, item: ItemId) -> Result<CountLabel> {
        let count = self.edges.eligible_incoming(item)?.len() as u64;
        let label = CountLabel::new(count);

        self.store
            .assign_labels(item, &self.config.count_taxonomy, &[label.bucket.label()])?;
        self.store.set_numeric_field(
            item,
            &self.config.count_field,
            i64::try_from(count).unwrap_or(i64::MAX),
        )?;

        log::debug!("Item {}: {}", item, label.bucket.describe());
        Ok(label)
    }

    /// Refresh several items, each at most once.
    pub fn refresh_all(&self, items: impl IntoIterator<Item = ItemId>) -> Result<usize> {
        let mut seen = std::collections::HashSet::new();
        for item in items {
            if seen.insert(item) {
                self.refresh(item)?;
            }
        }
        Ok(seen.len())
    }

    /// Last recorded count, if the item was ever counted.
    pub fn recorded(&self, item: ItemId) -> Result<Option<CountLabel>> {
        let count = self
            .store
            .get_numeric_field(item, &self.config.count_field)?;
        let bucket = self
            .store
            .labels_of(item, &self.config.count_taxonomy)?
            .first()
            .and_then(|l| CountBucket::from_label(l));

        Ok(match (count, bucket) {
            (Some(count), Some(bucket)) => Some(CountLabel {
                incoming_count: count.max(0) as u64,
                bucket,
            }),
            (Some(count), None) => Some(CountLabel::new(count.max(0) as u64)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ItemCatalog, MetaStore, RedbStore, TagStore};
    use crate::types::{Item, Taxonomy};
    use tempfile::TempDir;

    fn setup() -> (CountLabels<RedbStore>, Arc<EdgeStore<RedbStore>>, Arc<RedbStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(RedbStore::open(temp_dir.path().join("counts.redb")).unwrap());
        let config = GraphConfig::default();
        for tax in [&config.backlink_taxonomy, &config.count_taxonomy] {
            store
                .register_taxonomy(&Taxonomy::internal(tax, &config.item_types))
                .unwrap();
        }
        let edges = Arc::new(EdgeStore::new(store.clone(), config.clone()));
        let counts = CountLabels::new(store.clone(), edges.clone(), config);
        (counts, edges, store, temp_dir)
    }

    fn link(edges: &EdgeStore<RedbStore>, store: &RedbStore, source: u64, target: u64) {
        store
            .put_item(&Item::new(source, "post", "publish", &format!("Source {}", source), ""))
            .unwrap();
        edges.set_outgoing(ItemId(source), &[ItemId(target)]).unwrap();
    }

    #[test]
    fn test_refresh_counts_incoming() {
        let (counts, edges, store, _temp) = setup();
        for source in 1..=3 {
            link(&edges, &store, source, 100);
        }

        let label = counts.refresh(ItemId(100)).unwrap();
        assert_eq!(label.incoming_count, 3);
        assert_eq!(label.bucket, CountBucket::Exact(3));
        assert_eq!(
            store.labels_of(ItemId(100), "backlink_count").unwrap(),
            vec!["3".to_string()]
        );
        assert_eq!(
            store.get_numeric_field(ItemId(100), "_backlinks_count").unwrap(),
            Some(3)
        );
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let (counts, edges, store, _temp) = setup();
        link(&edges, &store, 1, 2);
        let first = counts.refresh(ItemId(2)).unwrap();
        let second = counts.refresh(ItemId(2)).unwrap();
        assert_eq!(first, second);
        assert_eq!(counts.recorded(ItemId(2)).unwrap(), Some(first));
    }

    #[test]
    fn test_many_bucket() {
        let (counts, edges, store, _temp) = setup();
        for source in 1..=12 {
            link(&edges, &store, source, 50);
        }
        let label = counts.refresh(ItemId(50)).unwrap();
        assert_eq!(label.incoming_count, 12);
        assert_eq!(label.bucket, CountBucket::Many);
    }

    #[test]
    fn test_zero_and_unrecorded() {
        let (counts, _edges, _store, _temp) = setup();
        assert_eq!(counts.recorded(ItemId(8)).unwrap(), None);
        let label = counts.refresh(ItemId(8)).unwrap();
        assert_eq!(label.bucket, CountBucket::Zero);
        assert_eq!(counts.recorded(ItemId(8)).unwrap(), Some(CountLabel::new(0)));
    }
}
