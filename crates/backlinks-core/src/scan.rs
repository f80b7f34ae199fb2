use crate::config::GraphConfig;
use crate::counts::CountLabels;
use crate::edges::EdgeStore;
use crate::error::{BacklinksError, Result};
use crate::extract::LinkExtractor;
use crate::resolver::UrlResolver;
use crate::store::GraphStore;
use crate::types::{IneligibleReason, Item, ItemId, ScanOutcome, ScanState};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

/// Scans items for outgoing links and keeps edges, counts and scan state
/// consistent.
pub struct ScanCoordinator<S: GraphStore, R: UrlResolver> {
    store: Arc<S>,
    extractor: LinkExtractor<R>,
    edges: Arc<EdgeStore<S>>,
    counts: Arc<CountLabels<S>>,
    config: GraphConfig,
}

impl<S: GraphStore, R: UrlResolver> ScanCoordinator<S, R> {
    pub fn new(
        store: Arc<S>,
        extractor: LinkExtractor<R>,
        edges: Arc<EdgeStore<S>>,
        counts: Arc<CountLabels<S>>,
        config: GraphConfig,
    ) -> Self {
        Self {
            store,
            extractor,
            edges,
            counts,
            config,
        }
    }

    /// Scan `item` now, regardless of debounce. Untracked types and
    /// statuses are left alone.
    pub fn scan(&self, item: &Item) -> Result<ScanOutcome> {
        if let Some(reason) = self.ineligible(item, &item.status) {
            log::trace!("Not scanning item {}: {}", item.id, reason);
            return Ok(ScanOutcome::Ineligible(reason));
        }
        self.rebuild(item).map(ScanOutcome::Scanned)
    }

    /// Rebuild the outgoing edges of `item` from its current body.
    ///
    /// Edges are replaced before any count is refreshed. The scan state is
    /// written last, so a failure part way leaves the item in the backlog and
    /// the next scan redoes the work.
    fn rebuild(&self, item: &Item) -> Result<Vec<ItemId>> {
        let targets = self.extractor.extract(item);
        let previous = self.edges.outgoing(item.id)?;

        self.edges.set_outgoing(item.id, &targets)?;

        let new_set: HashSet<ItemId> = targets.iter().copied().collect();
        let dropped: Vec<ItemId> = previous
            .into_iter()
            .filter(|id| !new_set.contains(id))
            .collect();

        let refreshed = self.counts.refresh_all(
            std::iter::once(item.id)
                .chain(targets.iter().copied())
                .chain(dropped.iter().copied()),
        )?;

        // Items that never got a count label yet, typically ones nothing links to.
        let unlabeled = self.edges.items_with_no_recorded_count()?;
        let swept = self.counts.refresh_all(unlabeled.iter().map(|i| i.id))?;

        self.store.set_numeric_field(
            item.id,
            &self.config.scan_field,
            item.modified_at.timestamp_millis(),
        )?;

        log::debug!(
            "Scanned item {}: {} outlinks, {} dropped, {} counts refreshed, {} swept",
            item.id,
            targets.len(),
            dropped.len(),
            refreshed,
            swept
        );

        Ok(targets)
    }

    /// Scan by id.
    pub fn scan_id(&self, id: ItemId) -> Result<ScanOutcome> {
        let item = self
            .store
            .get_item(id)?
            .ok_or(BacklinksError::ItemNotFound(id))?;
        self.scan(&item)
    }

    /// Drop the outgoing edges and scan state of `item`, putting it back in
    /// the backlog. Former targets get their counts refreshed.
    pub fn deregister(&self, item: ItemId) -> Result<Vec<ItemId>> {
        let previous = self.edges.outgoing(item)?;
        self.edges.set_outgoing(item, &[])?;
        self.store
            .delete_numeric_field(item, &self.config.scan_field)?;
        self.counts.refresh_all(previous.iter().copied())?;

        log::debug!("Deregistered item {} ({} outlinks removed)", item, previous.len());
        Ok(previous)
    }

    pub fn scan_state(&self, item: ItemId) -> Result<Option<ScanState>> {
        let millis = self
            .store
            .get_numeric_field(item, &self.config.scan_field)?;
        Ok(millis
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|at| ScanState {
                last_scanned_modified_at: at,
            }))
    }

    pub fn is_registered(&self, item: ItemId) -> Result<bool> {
        Ok(self
            .store
            .get_numeric_field(item, &self.config.scan_field)?
            .is_some())
    }

    fn ineligible(&self, item: &Item, new_status: &str) -> Option<IneligibleReason> {
        if !self.config.kind_ok(&item.kind) {
            return Some(IneligibleReason::Kind(item.kind.clone()));
        }
        if !self.config.status_ok(new_status) {
            return Some(IneligibleReason::Status(new_status.to_string()));
        }
        None
    }

    fn unchanged_since_scan(&self, item: &Item) -> Result<bool> {
        let last = self
            .store
            .get_numeric_field(item.id, &self.config.scan_field)?;
        Ok(last == Some(item.modified_at.timestamp_millis()))
    }

    /// Whether a status change to `new_status` warrants a rescan.
    pub fn should_rescan(&self, item: &Item, new_status: &str) -> Result<bool> {
        if self.ineligible(item, new_status).is_some() {
            return Ok(false);
        }
        Ok(!self.unchanged_since_scan(item)?)
    }

    /// Entry point for save/publish events. Rescans only eligible items
    /// whose content changed since the last scan.
    ///
    /// An item moving to an untracked status stops linking anywhere: its
    /// edges and scan state are dropped, so it is rebuilt if it comes back.
    pub fn on_status_transition(
        &self,
        item: &Item,
        previous_status: &str,
        new_status: &str,
    ) -> Result<ScanOutcome> {
        if let Some(reason) = self.ineligible(item, new_status) {
            log::trace!("Not scanning item {}: {}", item.id, reason);
            if self.is_registered(item.id)? || !self.edges.outgoing(item.id)?.is_empty() {
                self.deregister(item.id)?;
            }
            return Ok(ScanOutcome::Ineligible(reason));
        }
        if self.unchanged_since_scan(item)? {
            log::trace!(
                "Item {} unchanged since last scan ({} -> {})",
                item.id,
                previous_status,
                new_status
            );
            return Ok(ScanOutcome::Unchanged);
        }
        self.rebuild(item).map(ScanOutcome::Scanned)
    }

    /// Eligible items that were never scanned, in ascending id order.
    pub fn unregistered_items(&self) -> Result<Vec<Item>> {
        let mut out = Vec::new();
        for item in self.store.list_items(&self.config.eligible_filter())? {
            if !self.is_registered(item.id)? {
                out.push(item);
            }
        }
        Ok(out)
    }

    pub fn registered_count(&self) -> Result<u64> {
        let mut count = 0;
        for item in self.store.list_items(&self.config.eligible_filter())? {
            if self.is_registered(item.id)? {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn edges(&self) -> &EdgeStore<S> {
        &self.edges
    }

    pub fn counts(&self) -> &CountLabels<S> {
        &self.counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::SiteResolver;
    use crate::store::{ItemCatalog, RedbStore, TagStore};
    use crate::types::{CountBucket, Taxonomy};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    const SITE: &str = "https://example.com/";

    type Coordinator = ScanCoordinator<RedbStore, SiteResolver<RedbStore>>;

    fn setup() -> (Coordinator, Arc<RedbStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(RedbStore::open(temp_dir.path().join("scan.redb")).unwrap());
        let config = GraphConfig::default();
        for tax in [&config.backlink_taxonomy, &config.count_taxonomy] {
            store
                .register_taxonomy(&Taxonomy::internal(tax, &config.item_types))
                .unwrap();
        }
        let edges = Arc::new(EdgeStore::new(store.clone(), config.clone()));
        let counts = Arc::new(CountLabels::new(store.clone(), edges.clone(), config.clone()));
        let resolver = SiteResolver::new(SITE, store.clone()).unwrap();
        let coordinator =
            ScanCoordinator::new(store.clone(), LinkExtractor::new(resolver), edges, counts, config);
        (coordinator, store, temp_dir)
    }

    fn link(id: u64) -> String {
        format!(r#"<a href="{}?p={}">#{}</a>"#, SITE, id, id)
    }

    fn put(store: &RedbStore, id: u64, links: &[u64]) -> Item {
        let body: String = links.iter().map(|l| link(*l)).collect();
        let item = Item::new(id, "post", "publish", &format!("Item {}", id), &body);
        store.put_item(&item).unwrap();
        item
    }

    fn incoming_count(coordinator: &Coordinator, id: u64) -> u64 {
        coordinator
            .counts()
            .recorded(ItemId(id))
            .unwrap()
            .map(|c| c.incoming_count)
            .unwrap_or(0)
    }

    #[test]
    fn test_scan_builds_edges_and_counts() {
        let (coordinator, store, _temp) = setup();
        put(&store, 2, &[]);
        put(&store, 3, &[]);
        let a = put(&store, 1, &[2, 3, 2, 99]);

        let outcome = coordinator.scan(&a).unwrap();
        assert_eq!(outcome, ScanOutcome::Scanned(vec![ItemId(2), ItemId(3)]));
        assert_eq!(coordinator.edges().incoming(ItemId(2)).unwrap(), vec![ItemId(1)]);
        assert_eq!(incoming_count(&coordinator, 2), 1);
        assert_eq!(incoming_count(&coordinator, 3), 1);

        let own = coordinator.counts().recorded(ItemId(1)).unwrap().unwrap();
        assert_eq!(own.bucket, CountBucket::Zero);
        assert!(coordinator.is_registered(ItemId(1)).unwrap());
        assert!(!coordinator.is_registered(ItemId(2)).unwrap());
    }

    #[test]
    fn test_scan_idempotent() {
        let (coordinator, store, _temp) = setup();
        put(&store, 2, &[]);
        let a = put(&store, 1, &[2]);

        let first = coordinator.scan(&a).unwrap();
        let count_first = incoming_count(&coordinator, 2);
        let second = coordinator.scan(&a).unwrap();

        assert_eq!(first, second);
        assert_eq!(coordinator.edges().outgoing(ItemId(1)).unwrap(), vec![ItemId(2)]);
        assert_eq!(incoming_count(&coordinator, 2), count_first);
    }

    #[test]
    fn test_removed_link_updates_former_target() {
        let (coordinator, store, _temp) = setup();
        put(&store, 2, &[]);
        put(&store, 3, &[]);
        let a = put(&store, 1, &[2, 3]);
        coordinator.scan(&a).unwrap();

        let mut edited = a.clone();
        edited.body = link(3);
        edited.modified_at = a.modified_at + Duration::seconds(5);
        store.put_item(&edited).unwrap();
        coordinator.scan(&edited).unwrap();

        assert!(coordinator.edges().incoming(ItemId(2)).unwrap().is_empty());
        assert_eq!(incoming_count(&coordinator, 2), 0);
        assert_eq!(incoming_count(&coordinator, 3), 1);
    }

    #[test]
    fn test_count_matches_incoming_for_every_item() {
        let (coordinator, store, _temp) = setup();
        let graph: &[(u64, &[u64])] = &[(1, &[2, 3]), (2, &[3]), (3, &[1]), (4, &[3, 2])];
        let items: Vec<Item> = graph.iter().map(|(id, links)| put(&store, *id, links)).collect();
        for item in &items {
            coordinator.scan(item).unwrap();
        }

        for item in &items {
            let incoming = coordinator.edges().incoming(item.id).unwrap().len() as u64;
            assert_eq!(incoming_count(&coordinator, item.id.0), incoming, "item {}", item.id);
        }
        assert_eq!(incoming_count(&coordinator, 3), 3);
    }

    #[test]
    fn test_status_transition_debounce() {
        let (coordinator, store, _temp) = setup();
        put(&store, 2, &[]);
        let a = put(&store, 1, &[2]);

        let first = coordinator.on_status_transition(&a, "draft", "publish").unwrap();
        assert_eq!(first, ScanOutcome::Scanned(vec![ItemId(2)]));

        let second = coordinator.on_status_transition(&a, "publish", "publish").unwrap();
        assert_eq!(second, ScanOutcome::Unchanged);

        let mut edited = a.clone();
        edited.modified_at = Utc::now() + Duration::seconds(10);
        assert!(coordinator.should_rescan(&edited, "publish").unwrap());
    }

    #[test]
    fn test_status_transition_ineligible() {
        let (coordinator, store, _temp) = setup();
        let a = put(&store, 1, &[]);
        assert_eq!(
            coordinator.on_status_transition(&a, "publish", "draft").unwrap(),
            ScanOutcome::Ineligible(IneligibleReason::Status("draft".into()))
        );

        let attachment = Item::new(5, "attachment", "publish", "file", "");
        store.put_item(&attachment).unwrap();
        assert_eq!(
            coordinator.on_status_transition(&attachment, "draft", "publish").unwrap(),
            ScanOutcome::Ineligible(IneligibleReason::Kind("attachment".into()))
        );
        assert!(!coordinator.is_registered(ItemId(1)).unwrap());
    }

    #[test]
    fn test_scan_skips_untracked_items() {
        let (coordinator, store, _temp) = setup();
        put(&store, 1, &[]);
        let draft = Item::new(2, "post", "draft", "Draft", &link(1));
        store.put_item(&draft).unwrap();
        let attachment = Item::new(3, "attachment", "publish", "file", &link(1));
        store.put_item(&attachment).unwrap();

        assert_eq!(
            coordinator.scan_id(ItemId(2)).unwrap(),
            ScanOutcome::Ineligible(IneligibleReason::Status("draft".into()))
        );
        assert_eq!(
            coordinator.scan(&attachment).unwrap(),
            ScanOutcome::Ineligible(IneligibleReason::Kind("attachment".into()))
        );

        assert!(coordinator.edges().incoming(ItemId(1)).unwrap().is_empty());
        assert!(coordinator.scan_state(ItemId(2)).unwrap().is_none());
        assert!(coordinator.scan_state(ItemId(3)).unwrap().is_none());
        assert_eq!(coordinator.counts().recorded(ItemId(1)).unwrap(), None);
    }

    #[test]
    fn test_unpublished_source_stops_counting() {
        let (coordinator, store, _temp) = setup();
        put(&store, 1, &[]);
        let source = put(&store, 2, &[1]);
        coordinator.on_status_transition(&source, "draft", "publish").unwrap();
        assert_eq!(incoming_count(&coordinator, 1), 1);

        let mut draft = source.clone();
        draft.status = "draft".into();
        store.put_item(&draft).unwrap();
        assert_eq!(
            coordinator.on_status_transition(&draft, "publish", "draft").unwrap(),
            ScanOutcome::Ineligible(IneligibleReason::Status("draft".into()))
        );

        assert!(coordinator.edges().incoming(ItemId(1)).unwrap().is_empty());
        assert_eq!(incoming_count(&coordinator, 1), 0);
        assert!(!coordinator.is_registered(ItemId(2)).unwrap());

        // Publishing again rebuilds the edge.
        store.put_item(&source).unwrap();
        assert_eq!(
            coordinator.on_status_transition(&source, "draft", "publish").unwrap(),
            ScanOutcome::Scanned(vec![ItemId(1)])
        );
        assert_eq!(incoming_count(&coordinator, 1), 1);
    }

    #[test]
    fn test_count_ignores_sources_no_longer_tracked() {
        let (coordinator, store, _temp) = setup();
        put(&store, 1, &[]);
        let source = put(&store, 2, &[1]);
        coordinator.scan(&source).unwrap();

        // Status changed behind the index's back: the edge is still stored.
        let mut trashed = source.clone();
        trashed.status = "trash".into();
        store.put_item(&trashed).unwrap();

        assert_eq!(coordinator.edges().incoming(ItemId(1)).unwrap(), vec![ItemId(2)]);
        assert!(coordinator.edges().eligible_incoming(ItemId(1)).unwrap().is_empty());
        assert_eq!(coordinator.counts().refresh(ItemId(1)).unwrap().incoming_count, 0);
    }

    #[test]
    fn test_deregister_round_trip() {
        let (coordinator, store, _temp) = setup();
        put(&store, 2, &[]);
        put(&store, 3, &[]);
        let a = put(&store, 1, &[3, 2]);
        let before = coordinator.scan(&a).unwrap();

        let removed = coordinator.deregister(ItemId(1)).unwrap();
        assert_eq!(removed, vec![ItemId(2), ItemId(3)]);
        assert!(!coordinator.is_registered(ItemId(1)).unwrap());
        assert!(coordinator.edges().outgoing(ItemId(1)).unwrap().is_empty());
        assert_eq!(incoming_count(&coordinator, 2), 0);
        assert!(coordinator
            .unregistered_items()
            .unwrap()
            .iter()
            .any(|i| i.id == ItemId(1)));

        let after = coordinator.scan(&a).unwrap();
        assert_eq!(before, after);
        assert_eq!(incoming_count(&coordinator, 2), 1);
    }

    #[test]
    fn test_scan_missing_item() {
        let (coordinator, _store, _temp) = setup();
        let err = coordinator.scan_id(ItemId(77)).unwrap_err();
        assert!(matches!(err, BacklinksError::ItemNotFound(ItemId(77))));
        assert!(!err.is_collaborator_failure());
    }

    #[test]
    fn test_sweep_labels_items_nobody_links_to() {
        let (coordinator, store, _temp) = setup();
        put(&store, 2, &[]);
        put(&store, 3, &[]);
        let a = put(&store, 1, &[]);
        coordinator.scan(&a).unwrap();

        for id in [2, 3] {
            let label = coordinator.counts().recorded(ItemId(id)).unwrap().unwrap();
            assert_eq!(label.bucket, CountBucket::Zero);
        }
        assert_eq!(coordinator.registered_count().unwrap(), 1);
    }
}
