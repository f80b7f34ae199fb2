//! URL to item resolution.
//!
//! The graph only cares about links that point at items it knows. Anything
//! else (external sites, anchors, mailto, unknown slugs) resolves to `None`
//! and is dropped by the extractor.

use crate::error::{BacklinksError, Result};
use crate::store::ItemCatalog;
use crate::types::ItemId;
use std::sync::Arc;
use url::Url;

/// Maps an `href` to the item it points at.
pub trait UrlResolver: Send + Sync {
    fn resolve(&self, href: &str) -> Option<ItemId>;
}

/// Query keys that carry a numeric item id (`/?p=42`, `/?page_id=7`).
const ID_QUERY_KEYS: &[&str] = &["p", "page_id"];

/// Leading path segments of archive and system URLs. Their last segment is a
/// term, author or file name, never an item slug.
const ARCHIVE_PREFIXES: &[&str] = &[
    "category",
    "tag",
    "author",
    "page",
    "search",
    "feed",
    "comments",
    "wp-admin",
    "wp-content",
    "wp-includes",
    "wp-json",
];

/// Resolves permalinks of a single site against the item catalog.
///
/// Relative hrefs are joined onto the site base URL. Same-host URLs resolve
/// either by an id query parameter or by the last path segment as slug.
pub struct SiteResolver<C: ItemCatalog> {
    base: Url,
    catalog: Arc<C>,
}

impl<C: ItemCatalog> SiteResolver<C> {
    pub fn new(base_url: &str, catalog: Arc<C>) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            BacklinksError::Validation(format!("Invalid site URL '{}': {}", base_url, e))
        })?;
        if base.cannot_be_a_base() {
            return Err(BacklinksError::Validation(format!(
                "Site URL '{}' cannot be used as a base",
                base_url
            )));
        }
        Ok(Self { base, catalog })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn same_site(&self, url: &Url) -> bool {
        matches!(url.scheme(), "http" | "https")
            && url.host_str() == self.base.host_str()
            && url.port_or_known_default() == self.base.port_or_known_default()
    }

    fn known_id(&self, id: ItemId) -> Option<ItemId> {
        match self.catalog.get_item(id) {
            Ok(Some(_)) => Some(id),
            Ok(None) => None,
            Err(e) => {
                log::warn!("Failed to look up item {} while resolving link: {}", id, e);
                None
            }
        }
    }

    fn by_slug(&self, slug: &str) -> Option<ItemId> {
        match self.catalog.item_by_slug(slug) {
            Ok(item) => item.map(|i| i.id),
            Err(e) => {
                log::warn!("Failed to look up slug '{}' while resolving link: {}", slug, e);
                None
            }
        }
    }
}

impl<C: ItemCatalog> UrlResolver for SiteResolver<C> {
    fn resolve(&self, href: &str) -> Option<ItemId> {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let url = self.base.join(href).ok()?;
        if !self.same_site(&url) {
            return None;
        }

        for (key, value) in url.query_pairs() {
            if ID_QUERY_KEYS.contains(&key.as_ref()) {
                if let Ok(id) = value.parse::<u64>() {
                    return self.known_id(ItemId(id));
                }
            }
        }

        let base_path = self.base.path().trim_end_matches('/');
        let path = url.path();
        let relative = path.strip_prefix(base_path).unwrap_or(path);
        let segments: Vec<&str> = relative
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let (first, slug) = (segments.first()?, segments.last()?);
        if ARCHIVE_PREFIXES.contains(first) {
            return None;
        }
        self.by_slug(slug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RedbStore;
    use crate::types::Item;
    use tempfile::TempDir;

    fn setup() -> (SiteResolver<RedbStore>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(RedbStore::open(temp_dir.path().join("resolver.redb")).unwrap());
        store
            .put_item(&Item::new(42, "post", "publish", "Answer", "").with_slug("answer"))
            .unwrap();
        store
            .put_item(&Item::new(7, "page", "publish", "About", "").with_slug("about"))
            .unwrap();
        let resolver = SiteResolver::new("https://example.com/blog/", store).unwrap();
        (resolver, temp_dir)
    }

    #[test]
    fn test_resolves_id_queries() {
        let (resolver, _temp) = setup();
        assert_eq!(resolver.resolve("https://example.com/blog/?p=42"), Some(ItemId(42)));
        assert_eq!(resolver.resolve("/blog/?page_id=7"), Some(ItemId(7)));
        assert_eq!(resolver.resolve("?p=999"), None);
    }

    #[test]
    fn test_resolves_slugs() {
        let (resolver, _temp) = setup();
        assert_eq!(resolver.resolve("https://example.com/blog/2024/05/answer/"), Some(ItemId(42)));
        assert_eq!(resolver.resolve("about"), Some(ItemId(7)));
        assert_eq!(resolver.resolve("/blog/missing/"), None);
    }

    #[test]
    fn test_archive_paths_are_not_permalinks() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(RedbStore::open(temp_dir.path().join("archive.redb")).unwrap());
        for (id, slug) in [(1, "news"), (2, "rust"), (3, "admin")] {
            store
                .put_item(&Item::new(id, "post", "publish", slug, "").with_slug(slug))
                .unwrap();
        }
        let resolver = SiteResolver::new("https://example.com/", store).unwrap();

        assert_eq!(resolver.resolve("/category/news/"), None);
        assert_eq!(resolver.resolve("https://example.com/tag/rust/"), None);
        assert_eq!(resolver.resolve("/author/admin/"), None);
        assert_eq!(resolver.resolve("/category/news/feed/"), None);
        assert_eq!(resolver.resolve("/2024/01/news/"), Some(ItemId(1)));
        assert_eq!(resolver.resolve("/rust/"), Some(ItemId(2)));
    }

    #[test]
    fn test_ignores_foreign_and_non_http_links() {
        let (resolver, _temp) = setup();
        assert_eq!(resolver.resolve("https://other.org/blog/answer/"), None);
        assert_eq!(resolver.resolve("mailto:someone@example.com"), None);
        assert_eq!(resolver.resolve("#answer"), None);
        assert_eq!(resolver.resolve(""), None);
    }

    #[test]
    fn test_rejects_bad_base() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(RedbStore::open(temp_dir.path().join("r.redb")).unwrap());
        assert!(SiteResolver::new("not a url", store).is_err());
    }
}
