//! Directed edges stored as labels in the tag store.
//!
//! An edge `source -> target` exists iff `source` carries the label
//! `edge_label(target)` in the backlink taxonomy. Incoming edges of a target
//! are therefore a single label lookup in the tag store's reverse index.

use crate::config::GraphConfig;
use crate::error::{BacklinksError, Result};
use crate::store::{GraphStore, ItemFilter};
use crate::types::{Item, ItemId};
use std::sync::Arc;

const EDGE_LABEL_PREFIX: char = 'p';

/// Label standing for "links to `target`".
pub fn edge_label(target: ItemId) -> String {
    format!("{}{}", EDGE_LABEL_PREFIX, target.0)
}

/// Inverse of [`edge_label`]. Only canonical decimal forms are accepted so
/// that every id has exactly one label and every label exactly one id.
pub fn parse_edge_label(label: &str) -> Option<ItemId> {
    let digits = label.strip_prefix(EDGE_LABEL_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }
    digits.parse::<u64>().ok().map(ItemId)
}

/// Graph operations on top of the tag store.
pub struct EdgeStore<S: GraphStore> {
    store: Arc<S>,
    config: GraphConfig,
}

impl<S: GraphStore> EdgeStore<S> {
    pub fn new(store: Arc<S>, config: GraphConfig) -> Self {
        Self { store, config }
    }

    /// Replace every outgoing edge of `source` with edges to `targets`.
    pub fn set_outgoing(&self, source: ItemId, targets: &[ItemId]) -> Result<()> {
        let mut labels: Vec<String> = targets.iter().copied().map(edge_label).collect();
        labels.sort();
        labels.dedup();
        self.store
            .assign_labels(source, &self.config.backlink_taxonomy, &labels)
    }

    /// Targets `source` currently links to, in ascending id order.
    pub fn outgoing(&self, source: ItemId) -> Result<Vec<ItemId>> {
        let labels = self
            .store
            .labels_of(source, &self.config.backlink_taxonomy)?;
        let mut targets = labels
            .into_iter()
            .map(|label| {
                parse_edge_label(&label).ok_or_else(|| BacklinksError::InvalidLabel {
                    taxonomy: self.config.backlink_taxonomy.clone(),
                    label,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        targets.sort();
        Ok(targets)
    }

    /// Sources linking to `target`, in ascending id order.
    pub fn incoming(&self, target: ItemId) -> Result<Vec<ItemId>> {
        self.store
            .items_with_label(&self.config.backlink_taxonomy, &edge_label(target))
    }

    /// Sources linking to `target` whose type and status are still tracked.
    /// Edges of items unpublished without a rescan stay stored but are not
    /// counted.
    pub fn eligible_incoming(&self, target: ItemId) -> Result<Vec<ItemId>> {
        let sources = self.incoming(target)?;
        if sources.is_empty() {
            return Ok(sources);
        }
        let filter = self.config.eligible_filter().with_ids(sources);
        Ok(self
            .store
            .list_items(&filter)?
            .into_iter()
            .map(|item| item.id)
            .collect())
    }

    /// Eligible items that never had a backlink count assigned.
    pub fn items_with_no_recorded_count(&self) -> Result<Vec<Item>> {
        let mut out = Vec::new();
        for item in self.store.list_items(&self.config.eligible_filter())? {
            if self
                .store
                .labels_of(item.id, &self.config.count_taxonomy)?
                .is_empty()
            {
                out.push(item);
            }
        }
        Ok(out)
    }

    /// Resolve ids to items, dropping ids the catalog no longer knows.
    pub fn items(&self, ids: Vec<ItemId>) -> Result<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.store.list_items(&ItemFilter::new().with_ids(ids))
    }
}
