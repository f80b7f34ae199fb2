use crate::types::{Item, ItemId};

/// Filter criteria for listing items
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub kinds: Option<Vec<String>>,
    pub statuses: Option<Vec<String>>,
    pub ids: Option<Vec<ItemId>>,
    pub exclude: Vec<ItemId>,
}

impl ItemFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter by item types
    pub fn with_kinds(mut self, kinds: &[String]) -> Self {
        self.kinds = Some(kinds.to_vec());
        self
    }

    /// Filter by statuses
    pub fn with_statuses(mut self, statuses: &[String]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    /// Only these items
    pub fn with_ids(mut self, ids: Vec<ItemId>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = ItemId>) -> Self {
        self.exclude.extend(ids);
        self
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(ref kinds) = self.kinds {
            if !kinds.contains(&item.kind) {
                return false;
            }
        }

        if let Some(ref statuses) = self.statuses {
            if !statuses.contains(&item.status) {
                return false;
            }
        }

        if let Some(ref ids) = self.ids {
            if !ids.contains(&item.id) {
                return false;
            }
        }

        !self.exclude.contains(&item.id)
    }
}
