//! Content link extraction: item body -> referenced item ids.

use crate::resolver::UrlResolver;
use crate::types::{Item, ItemId};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Matches the href attribute of an anchor tag. Value in one of three groups
/// depending on quoting.
static ANCHOR_HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s(?:[^>]*?\s)?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
        .expect("anchor href pattern is valid")
});

/// Raw href values of all anchors in `html`, in document order.
pub fn anchor_hrefs(html: &str) -> Vec<String> {
    ANCHOR_HREF
        .captures_iter(html)
        .filter_map(|cap| cap.get(1).or_else(|| cap.get(2)).or_else(|| cap.get(3)))
        .map(|m| decode_entities(m.as_str()))
        .filter(|href| !href.trim().is_empty())
        .collect()
}

fn decode_entities(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&#038;", "&")
        .replace("&#38;", "&")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Extracts outgoing links from item bodies through a resolver.
pub struct LinkExtractor<R: UrlResolver> {
    resolver: R,
}

impl<R: UrlResolver> LinkExtractor<R> {
    pub fn new(resolver: R) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Ordered-unique ids of the items `item` links to. Links that do not
    /// resolve to a known item are skipped.
    pub fn extract(&self, item: &Item) -> Vec<ItemId> {
        self.extract_from(&item.body)
    }

    pub fn extract_from(&self, body: &str) -> Vec<ItemId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for href in anchor_hrefs(body) {
            match self.resolver.resolve(&href) {
                Some(id) => {
                    if seen.insert(id) {
                        out.push(id);
                    }
                }
                None => log::trace!("Skipping unresolved link {}", href),
            }
        }
        out
    }
}
