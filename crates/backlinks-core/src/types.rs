use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a content item. Assigned by the content system, not by us.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ItemId {
    fn from(v: u64) -> Self {
        ItemId(v)
    }
}

/// A content item (post/page equivalent) as seen by the link graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: ItemId,

    /// Item type, e.g. "post" or "page". Decides which taxonomies apply.
    pub kind: String,

    /// Publication status, e.g. "publish", "future", "draft".
    pub status: String,

    pub title: String,

    /// URL path segment the item is published under.
    pub slug: String,

    /// Raw HTML body. Links are extracted from here.
    pub body: String,

    pub modified_at: DateTime<Utc>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, kind: &str, status: &str, title: &str, body: &str) -> Self {
        let id = id.into();
        Item {
            id,
            kind: kind.to_string(),
            status: status.to_string(),
            title: title.to_string(),
            slug: slugify(title, id),
            body: body.to_string(),
            modified_at: Utc::now(),
        }
    }

    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = slug.to_string();
        self
    }

    pub fn with_modified_at(mut self, at: DateTime<Utc>) -> Self {
        self.modified_at = at;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.kind.is_empty() {
            return Err(format!("Item {} has an empty type", self.id));
        }
        if self.status.is_empty() {
            return Err(format!("Item {} has an empty status", self.id));
        }
        if self.slug.contains('/') {
            return Err(format!("Slug '{}' must not contain '/'", self.slug));
        }
        Ok(())
    }
}

fn slugify(title: &str, id: ItemId) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut dash = false;
    for c in title.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() {
            slug.push(c);
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        format!("item-{}", id)
    } else {
        slug
    }
}

/// Persisted record of the last successful scan of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanState {
    pub last_scanned_modified_at: DateTime<Utc>,
}

/// Coarse backlink count bucket shown in list filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountBucket {
    Zero,
    /// 1 through 9.
    Exact(u8),
    /// 10 or more.
    Many,
}

impl CountBucket {
    pub fn from_count(count: u64) -> Self {
        match count {
            0 => CountBucket::Zero,
            1..=9 => CountBucket::Exact(count as u8),
            _ => CountBucket::Many,
        }
    }

    /// Label assigned in the count taxonomy.
    pub fn label(&self) -> String {
        match self {
            CountBucket::Zero => "zero".to_string(),
            CountBucket::Exact(n) => n.to_string(),
            CountBucket::Many => "many".to_string(),
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "zero" => Some(CountBucket::Zero),
            "many" => Some(CountBucket::Many),
            _ => match label.parse::<u8>() {
                Ok(n @ 1..=9) if label.len() == 1 => Some(CountBucket::Exact(n)),
                _ => None,
            },
        }
    }

    /// Human readable text for display layers.
    pub fn describe(&self) -> String {
        match self {
            CountBucket::Zero => "Has 0 backlinks".to_string(),
            CountBucket::Exact(1) => "Has 1 backlink".to_string(),
            CountBucket::Exact(n) => format!("Has {} backlinks", n),
            CountBucket::Many => "Has many backlinks".to_string(),
        }
    }
}

impl fmt::Display for CountBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Incoming edge count of an item as last recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountLabel {
    pub incoming_count: u64,
    pub bucket: CountBucket,
}

impl CountLabel {
    pub fn new(incoming_count: u64) -> Self {
        Self {
            incoming_count,
            bucket: CountBucket::from_count(incoming_count),
        }
    }
}

/// A classification scheme and the item types it applies to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Taxonomy {
    pub id: String,
    pub object_types: Vec<String>,
    /// Non-public taxonomies are bookkeeping and never feed suggestions.
    pub public: bool,
}

impl Taxonomy {
    pub fn new(id: &str, object_types: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            object_types: object_types.iter().map(|s| s.to_string()).collect(),
            public: true,
        }
    }

    pub fn internal(id: &str, object_types: &[String]) -> Self {
        Self {
            id: id.to_string(),
            object_types: object_types.to_vec(),
            public: false,
        }
    }

    pub fn applies_to(&self, kind: &str) -> bool {
        self.object_types.iter().any(|t| t == kind)
    }
}

/// A ranked link suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub item: Item,
    /// Number of taxonomy terms shared with the subject item.
    pub score: u32,
}

/// Why a scan request was a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IneligibleReason {
    /// Item type is not tracked.
    Kind(String),
    /// The (new) status is not tracked.
    Status(String),
}

impl fmt::Display for IneligibleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IneligibleReason::Kind(k) => write!(f, "type '{}' is not tracked", k),
            IneligibleReason::Status(s) => write!(f, "status '{}' is not tracked", s),
        }
    }
}

/// Result of the debounced status-transition entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The item was scanned; carries the new outgoing targets.
    Scanned(Vec<ItemId>),
    /// Type or status not tracked.
    Ineligible(IneligibleReason),
    /// Already scanned at this modification time.
    Unchanged,
}

impl ScanOutcome {
    /// New outgoing targets if the item was scanned, empty otherwise.
    pub fn targets(&self) -> &[ItemId] {
        match self {
            ScanOutcome::Scanned(targets) => targets,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_bucket_boundaries() {
        assert_eq!(CountBucket::from_count(0), CountBucket::Zero);
        assert_eq!(CountBucket::from_count(1), CountBucket::Exact(1));
        assert_eq!(CountBucket::from_count(9), CountBucket::Exact(9));
        assert_eq!(CountBucket::from_count(10), CountBucket::Many);
        assert_eq!(CountBucket::from_count(250), CountBucket::Many);
    }

    #[test]
    fn test_count_bucket_labels() {
        for n in 0..12 {
            let bucket = CountBucket::from_count(n);
            assert_eq!(CountBucket::from_label(&bucket.label()), Some(bucket));
        }
        assert_eq!(CountBucket::from_label("0"), None);
        assert_eq!(CountBucket::from_label("10"), None);
        assert_eq!(CountBucket::Exact(1).describe(), "Has 1 backlink");
        assert_eq!(CountBucket::Exact(4).describe(), "Has 4 backlinks");
    }

    #[test]
    fn test_slug_from_title() {
        let item = Item::new(7, "post", "publish", "Hello, World!  Again", "");
        assert_eq!(item.slug, "hello-world-again");

        let item = Item::new(8, "post", "publish", "???", "");
        assert_eq!(item.slug, "item-8");
    }

    #[test]
    fn test_taxonomy_applies_to() {
        let tax = Taxonomy::new("category", &["post"]);
        assert!(tax.applies_to("post"));
        assert!(!tax.applies_to("page"));
    }
}
