use crate::backlog::{BacklogScheduler, BacklogState, TickOutcome};
use crate::config::{BacklogConfig, GraphConfig};
use crate::counts::CountLabels;
use crate::edges::EdgeStore;
use crate::error::{BacklinksError, Result};
use crate::events::{self, EventOutcome, ItemEvent};
use crate::extract::LinkExtractor;
use crate::metrics::DrainReport;
use crate::resolver::SiteResolver;
use crate::scan::ScanCoordinator;
use crate::store::{Clock, ItemCatalog, RedbStore, SystemClock, TagStore};
use crate::suggest::SuggestionEngine;
use crate::types::{CountLabel, Item, ItemId, ScanOutcome, ScanState, Suggestion, Taxonomy};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Config for embedded library mode.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Base URL links are resolved against. Default: "http://localhost/"
    pub site_url: String,
    pub graph: GraphConfig,
    pub backlog: BacklogConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            site_url: "http://localhost/".into(),
            graph: GraphConfig::default(),
            backlog: BacklogConfig::default(),
        }
    }
}

/// Snapshot of how far indexing has got.
#[derive(Debug, Clone, Serialize)]
pub struct IndexStatus {
    pub eligible: u64,
    pub registered: u64,
    pub unregistered: u64,
    pub backlog_state: String,
}

type Resolver = SiteResolver<RedbStore>;

/// High-level, embedded backlinks index over a redb file.
///
/// # Example
/// ```rust,no_run
/// use backlinks_core::{Backlinks, Item, LibraryConfig};
///
/// let index = Backlinks::open("./backlinks.redb", LibraryConfig::default()).unwrap();
/// index.put_item(&Item::new(1, "post", "publish", "Hello", "")).unwrap();
/// index.scan(1.into()).unwrap();
/// let backlinks = index.incoming(1.into()).unwrap();
/// ```
pub struct Backlinks {
    store: Arc<RedbStore>,
    edges: Arc<EdgeStore<RedbStore>>,
    counts: Arc<CountLabels<RedbStore>>,
    scanner: Arc<ScanCoordinator<RedbStore, Resolver>>,
    suggestions: SuggestionEngine<RedbStore>,
    backlog: BacklogScheduler<RedbStore, Resolver>,
    config: LibraryConfig,
}

impl Backlinks {
    /// Open (or create) an index at the given path.
    pub fn open(path: impl AsRef<Path>, config: LibraryConfig) -> Result<Self> {
        Self::open_with_clock(path, config, Arc::new(SystemClock))
    }

    pub fn open_with_clock(
        path: impl AsRef<Path>,
        config: LibraryConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.graph.validate()?;
        config.backlog.validate()?;

        let store = Arc::new(RedbStore::open_with_clock(path.as_ref(), clock)?);
        for taxonomy in [&config.graph.backlink_taxonomy, &config.graph.count_taxonomy] {
            store.register_taxonomy(&Taxonomy::internal(taxonomy, &config.graph.item_types))?;
        }

        let graph = config.graph.clone();
        let edges = Arc::new(EdgeStore::new(store.clone(), graph.clone()));
        let counts = Arc::new(CountLabels::new(store.clone(), edges.clone(), graph.clone()));
        let resolver = SiteResolver::new(&config.site_url, store.clone())?;
        let scanner = Arc::new(ScanCoordinator::new(
            store.clone(),
            LinkExtractor::new(resolver),
            edges.clone(),
            counts.clone(),
            graph.clone(),
        ));
        let suggestions = SuggestionEngine::new(store.clone(), edges.clone(), graph);
        let backlog = BacklogScheduler::new(store.clone(), scanner.clone(), config.backlog.clone())?;

        Ok(Self {
            store,
            edges,
            counts,
            scanner,
            suggestions,
            backlog,
            config,
        })
    }

    fn require(&self, id: ItemId) -> Result<Item> {
        self.store
            .get_item(id)?
            .ok_or(BacklinksError::ItemNotFound(id))
    }

    fn is_internal(&self, taxonomy: &str) -> bool {
        taxonomy == self.config.graph.backlink_taxonomy
            || taxonomy == self.config.graph.count_taxonomy
    }

    // --- Catalog ---

    pub fn put_item(&self, item: &Item) -> Result<()> {
        item.validate().map_err(BacklinksError::Validation)?;
        self.store.put_item(item)
    }

    pub fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        self.store.get_item(id)
    }

    /// Items of a tracked type and status, ascending by id.
    pub fn eligible_items(&self) -> Result<Vec<Item>> {
        self.store.list_items(&self.config.graph.eligible_filter())
    }

    pub fn register_taxonomy(&self, taxonomy: &Taxonomy) -> Result<()> {
        if self.is_internal(&taxonomy.id) {
            return Err(BacklinksError::Validation(format!(
                "Taxonomy '{}' is reserved",
                taxonomy.id
            )));
        }
        self.store.register_taxonomy(taxonomy)
    }

    /// Replace the terms `item` carries in a public taxonomy.
    pub fn assign_terms(&self, item: ItemId, taxonomy: &str, terms: &[String]) -> Result<()> {
        if self.is_internal(taxonomy) {
            return Err(BacklinksError::Validation(format!(
                "Taxonomy '{}' is managed by the index",
                taxonomy
            )));
        }
        self.store.assign_labels(item, taxonomy, terms)
    }

    pub fn terms_of(&self, item: ItemId, taxonomy: &str) -> Result<Vec<String>> {
        self.store.labels_of(item, taxonomy)
    }

    // --- Scanning ---

    /// Scan now, regardless of debounce. Untracked items are left alone.
    pub fn scan(&self, id: ItemId) -> Result<ScanOutcome> {
        self.scanner.scan_id(id)
    }

    /// Put `id` back in the backlog, including after a failed backlog scan.
    pub fn deregister(&self, id: ItemId) -> Result<Vec<ItemId>> {
        let removed = self.scanner.deregister(id)?;
        self.backlog.clear_failure(id)?;
        Ok(removed)
    }

    /// Deregister every eligible item, returning how many were touched.
    pub fn deregister_all(&self) -> Result<usize> {
        let items = self.eligible_items()?;
        for item in &items {
            self.deregister(item.id)?;
        }
        log::info!("Deregistered {} items", items.len());
        Ok(items.len())
    }

    pub fn scan_state(&self, id: ItemId) -> Result<Option<ScanState>> {
        self.scanner.scan_state(id)
    }

    pub fn unregistered_items(&self) -> Result<Vec<Item>> {
        self.scanner.unregistered_items()
    }

    pub fn status(&self) -> Result<IndexStatus> {
        let eligible = self
            .store
            .count_items(&self.config.graph.eligible_filter())?;
        let registered = self.scanner.registered_count()?;
        Ok(IndexStatus {
            eligible,
            registered,
            unregistered: eligible.saturating_sub(registered),
            backlog_state: self.backlog.state()?.to_string(),
        })
    }

    // --- Graph queries ---

    /// Tracked items linking to `id`, ascending by id.
    pub fn incoming(&self, id: ItemId) -> Result<Vec<Item>> {
        self.edges.items(self.edges.eligible_incoming(id)?)
    }

    /// Items `id` links to, ascending by id.
    pub fn outgoing(&self, id: ItemId) -> Result<Vec<Item>> {
        self.edges.items(self.edges.outgoing(id)?)
    }

    pub fn count_label(&self, id: ItemId) -> Result<Option<CountLabel>> {
        self.counts.recorded(id)
    }

    // --- Suggestions ---

    pub fn suggestions_for_item(&self, id: ItemId) -> Result<Vec<Suggestion>> {
        let item = self.require(id)?;
        self.suggestions.suggestions_for_item(&item)
    }

    pub fn outlink_suggestions(&self, id: ItemId) -> Result<Vec<Suggestion>> {
        let item = self.require(id)?;
        self.suggestions.outlink_suggestions(&item)
    }

    /// Public taxonomies suggestions for `id` are drawn from.
    pub fn suggestion_taxonomies(&self, id: ItemId) -> Result<Vec<Taxonomy>> {
        let item = self.require(id)?;
        self.suggestions.applicable_taxonomies(&item.kind)
    }

    /// Unscored candidates from a single taxonomy, for verbose reporting.
    pub fn suggestions_by_taxonomy(
        &self,
        id: ItemId,
        taxonomy: &str,
        exclude: &[ItemId],
    ) -> Result<Vec<Item>> {
        let item = self.require(id)?;
        self.suggestions.by_taxonomy(&item, taxonomy, exclude)
    }

    pub fn over_common_threshold(&self) -> Result<u64> {
        self.suggestions.over_common_threshold()
    }

    // --- Backlog ---

    pub fn tick(&self) -> Result<TickOutcome> {
        self.backlog.tick()
    }

    pub fn fire_due(&self) -> Result<Option<DrainReport>> {
        self.backlog.fire_due()
    }

    /// Drain one batch immediately, skipping the schedule.
    pub fn drain(&self) -> Result<DrainReport> {
        self.backlog.drain()
    }

    pub fn backlog_state(&self) -> Result<BacklogState> {
        self.backlog.state()
    }

    pub fn backlog(&self) -> &BacklogScheduler<RedbStore, Resolver> {
        &self.backlog
    }

    pub fn handle(&self, event: ItemEvent) -> Result<EventOutcome> {
        events::dispatch(&self.scanner, &self.backlog, event)
    }

    pub fn store(&self) -> &Arc<RedbStore> {
        &self.store
    }

    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }
}
