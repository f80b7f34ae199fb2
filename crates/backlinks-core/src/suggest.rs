//! Link suggestions from shared taxonomy terms.
//!
//! Two items are considered related in proportion to how many terms they
//! share across the taxonomies that apply to both. Terms carried by a large
//! share of the published corpus say little about relatedness, so they are
//! not used to find candidates (they still count towards the score).

use crate::config::GraphConfig;
use crate::edges::EdgeStore;
use crate::error::Result;
use crate::store::{GraphStore, ItemFilter};
use crate::types::{Item, ItemId, Suggestion, Taxonomy};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

pub struct SuggestionEngine<S: GraphStore> {
    store: Arc<S>,
    edges: Arc<EdgeStore<S>>,
    config: GraphConfig,
}

impl<S: GraphStore> SuggestionEngine<S> {
    pub fn new(store: Arc<S>, edges: Arc<EdgeStore<S>>, config: GraphConfig) -> Self {
        Self {
            store,
            edges,
            config,
        }
    }

    /// Public taxonomies that apply to items of type `kind`.
    pub fn applicable_taxonomies(&self, kind: &str) -> Result<Vec<Taxonomy>> {
        Ok(self
            .store
            .taxonomies_applicable_to(kind)?
            .into_iter()
            .filter(|t| t.public)
            .collect())
    }

    /// Usage count at which a term is too common to suggest from.
    pub fn over_common_threshold(&self) -> Result<u64> {
        let published = self.store.count_items(
            &ItemFilter::new()
                .with_kinds(&self.config.item_types)
                .with_statuses(std::slice::from_ref(&self.config.published_status)),
        )?;
        Ok(published / self.config.over_common_divisor)
    }

    fn candidates_in(
        &self,
        item: &Item,
        taxonomy: &str,
        exclude: &HashSet<ItemId>,
        threshold: u64,
    ) -> Result<Vec<Item>> {
        let mut ids = BTreeSet::new();
        for term in self.store.labels_of(item.id, taxonomy)? {
            let usage = self.store.label_usage_count(taxonomy, &term)?;
            if usage >= threshold {
                log::trace!(
                    "Skipping over-common term '{}' in {} ({} uses, limit {})",
                    term,
                    taxonomy,
                    usage,
                    threshold
                );
                continue;
            }
            ids.extend(self.store.items_with_label(taxonomy, &term)?);
        }

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.list_items(
            &self
                .config
                .eligible_filter()
                .with_ids(ids.into_iter().collect())
                .excluding(exclude.iter().copied().chain(std::iter::once(item.id))),
        )
    }

    /// Candidates sharing at least one discriminating term with `item` in
    /// `taxonomy`, ascending by id. Unscored.
    pub fn by_taxonomy(&self, item: &Item, taxonomy: &str, exclude: &[ItemId]) -> Result<Vec<Item>> {
        let exclude: HashSet<ItemId> = exclude.iter().copied().collect();
        let threshold = self.over_common_threshold()?;
        self.candidates_in(item, taxonomy, &exclude, threshold)
    }

    /// Ranked suggestions for `item`, never including `item` or anything in
    /// `exclude`. Ties keep taxonomy order, then id order.
    pub fn suggestions_excluding(&self, item: &Item, exclude: &[ItemId]) -> Result<Vec<Suggestion>> {
        let taxonomies = self.applicable_taxonomies(&item.kind)?;
        let exclude: HashSet<ItemId> = exclude.iter().copied().collect();
        let threshold = self.over_common_threshold()?;

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for taxonomy in &taxonomies {
            for candidate in self.candidates_in(item, &taxonomy.id, &exclude, threshold)? {
                if seen.insert(candidate.id) {
                    candidates.push(candidate);
                }
            }
        }

        let mut own_terms: HashMap<&str, HashSet<String>> = HashMap::new();
        for taxonomy in &taxonomies {
            let terms = self.store.labels_of(item.id, &taxonomy.id)?;
            own_terms.insert(taxonomy.id.as_str(), terms.into_iter().collect());
        }

        let mut suggestions = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let mut score = 0u32;
            for taxonomy in taxonomies.iter().filter(|t| t.applies_to(&candidate.kind)) {
                let Some(terms) = own_terms.get(taxonomy.id.as_str()) else {
                    continue;
                };
                score += self
                    .store
                    .labels_of(candidate.id, &taxonomy.id)?
                    .iter()
                    .filter(|t| terms.contains(*t))
                    .count() as u32;
            }
            suggestions.push(Suggestion {
                item: candidate,
                score,
            });
        }

        // Stable, so equal scores keep insertion order.
        suggestions.sort_by(|a, b| b.score.cmp(&a.score));
        Ok(suggestions)
    }

    /// Items that could link to `item`. Existing backlinks are excluded.
    pub fn suggestions_for_item(&self, item: &Item) -> Result<Vec<Suggestion>> {
        let backlinks = self.edges.incoming(item.id)?;
        self.suggestions_excluding(item, &backlinks)
    }

    /// Items `item` could link to. Existing outlinks are excluded.
    pub fn outlink_suggestions(&self, item: &Item) -> Result<Vec<Suggestion>> {
        let outlinks = self.edges.outgoing(item.id)?;
        self.suggestions_excluding(item, &outlinks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ItemCatalog, RedbStore, TagStore};
    use tempfile::TempDir;

    struct Fixture {
        engine: SuggestionEngine<RedbStore>,
        edges: Arc<EdgeStore<RedbStore>>,
        store: Arc<RedbStore>,
        _temp: TempDir,
    }

    /// Twelve published posts (over-common limit 4), a `tag` taxonomy for
    /// posts and a `category` taxonomy for posts and pages.
    fn setup() -> Fixture {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(RedbStore::open(temp_dir.path().join("suggest.redb")).unwrap());
        let config = GraphConfig::default();
        store
            .register_taxonomy(&Taxonomy::internal(&config.backlink_taxonomy, &config.item_types))
            .unwrap();
        store.register_taxonomy(&Taxonomy::new("tag", &["post"])).unwrap();
        store
            .register_taxonomy(&Taxonomy::new("category", &["post", "page"]))
            .unwrap();
        for id in 1..=12 {
            store
                .put_item(&Item::new(id, "post", "publish", &format!("Post {}", id), ""))
                .unwrap();
        }
        let edges = Arc::new(EdgeStore::new(store.clone(), config.clone()));
        let engine = SuggestionEngine::new(store.clone(), edges.clone(), config);
        Fixture {
            engine,
            edges,
            store,
            _temp: temp_dir,
        }
    }

    fn tag(store: &RedbStore, id: u64, taxonomy: &str, terms: &[&str]) {
        let terms: Vec<String> = terms.iter().map(|t| t.to_string()).collect();
        store.assign_labels(ItemId(id), taxonomy, &terms).unwrap();
    }

    fn ranked(suggestions: &[Suggestion]) -> Vec<(u64, u32)> {
        suggestions.iter().map(|s| (s.item.id.0, s.score)).collect()
    }

    #[test]
    fn test_more_shared_terms_rank_higher() {
        let f = setup();
        tag(&f.store, 1, "tag", &["x", "y", "z"]);
        tag(&f.store, 2, "tag", &["x"]);
        tag(&f.store, 3, "tag", &["x", "y", "z"]);

        let item = f.store.get_item(ItemId(1)).unwrap().unwrap();
        let suggestions = f.engine.suggestions_for_item(&item).unwrap();
        assert_eq!(ranked(&suggestions), vec![(3, 3), (2, 1)]);
    }

    #[test]
    fn test_excludes_self_and_backlinks() {
        let f = setup();
        tag(&f.store, 1, "tag", &["x"]);
        tag(&f.store, 2, "tag", &["x"]);
        tag(&f.store, 3, "tag", &["x"]);
        f.edges.set_outgoing(ItemId(2), &[ItemId(1)]).unwrap();

        let item = f.store.get_item(ItemId(1)).unwrap().unwrap();
        let suggestions = f.engine.suggestions_for_item(&item).unwrap();
        assert_eq!(ranked(&suggestions), vec![(3, 1)]);

        let outward = f.engine.outlink_suggestions(&item).unwrap();
        assert_eq!(ranked(&outward), vec![(2, 1), (3, 1)]);
    }

    #[test]
    fn test_over_common_terms_do_not_admit_candidates() {
        let f = setup();
        assert_eq!(f.engine.over_common_threshold().unwrap(), 4);

        tag(&f.store, 1, "tag", &["common", "rare"]);
        for id in 2..=4 {
            tag(&f.store, id, "tag", &["common"]);
        }
        tag(&f.store, 5, "tag", &["common", "rare"]);

        let item = f.store.get_item(ItemId(1)).unwrap().unwrap();
        let suggestions = f.engine.suggestions_for_item(&item).unwrap();
        // "common" has 5 uses, so only the "rare" sibling is a candidate,
        // but the shared "common" term still counts towards its score.
        assert_eq!(ranked(&suggestions), vec![(5, 2)]);
    }

    #[test]
    fn test_score_only_counts_taxonomies_applicable_to_candidate() {
        let f = setup();
        f.store
            .put_item(&Item::new(20, "page", "publish", "Page", ""))
            .unwrap();
        tag(&f.store, 1, "category", &["c1"]);
        tag(&f.store, 1, "tag", &["x"]);
        tag(&f.store, 20, "category", &["c1"]);
        tag(&f.store, 20, "tag", &["x"]);

        let item = f.store.get_item(ItemId(1)).unwrap().unwrap();
        let suggestions = f.engine.suggestions_for_item(&item).unwrap();
        assert_eq!(ranked(&suggestions), vec![(20, 1)]);
    }

    #[test]
    fn test_ties_keep_taxonomy_then_id_order() {
        let f = setup();
        tag(&f.store, 1, "category", &["c1"]);
        tag(&f.store, 1, "tag", &["x"]);
        tag(&f.store, 9, "tag", &["x"]);
        tag(&f.store, 7, "category", &["c1"]);
        tag(&f.store, 4, "tag", &["x"]);

        let item = f.store.get_item(ItemId(1)).unwrap().unwrap();
        let suggestions = f.engine.suggestions_for_item(&item).unwrap();
        // "category" sorts before "tag"
        assert_eq!(ranked(&suggestions), vec![(7, 1), (4, 1), (9, 1)]);
    }

    #[test]
    fn test_internal_taxonomies_ignored_and_ineligible_skipped() {
        let f = setup();
        f.store
            .put_item(&Item::new(30, "post", "draft", "Draft", ""))
            .unwrap();
        tag(&f.store, 1, "tag", &["x"]);
        tag(&f.store, 30, "tag", &["x"]);
        f.edges.set_outgoing(ItemId(1), &[ItemId(5)]).unwrap();
        f.edges.set_outgoing(ItemId(2), &[ItemId(5)]).unwrap();

        let taxonomies = f.engine.applicable_taxonomies("post").unwrap();
        let ids: Vec<&str> = taxonomies.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["category", "tag"]);

        let item = f.store.get_item(ItemId(1)).unwrap().unwrap();
        assert!(f.engine.suggestions_for_item(&item).unwrap().is_empty());
    }

    #[test]
    fn test_by_taxonomy_respects_exclusions() {
        let f = setup();
        tag(&f.store, 1, "tag", &["x"]);
        tag(&f.store, 2, "tag", &["x"]);
        tag(&f.store, 3, "tag", &["x"]);

        let item = f.store.get_item(ItemId(1)).unwrap().unwrap();
        let found = f.engine.by_taxonomy(&item, "tag", &[ItemId(2)]).unwrap();
        let ids: Vec<u64> = found.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![3]);
    }
}
