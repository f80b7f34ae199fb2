use crate::cli::{open_index, ImportArgs};
use crate::config::BacklinksConfig;
use anyhow::{Context, Result};
use backlinks_core::{EventOutcome, Item, ItemEvent, ItemId, ScanOutcome, Taxonomy};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Import document: taxonomies first, then items with their terms.
#[derive(Debug, Deserialize)]
struct ImportFile {
    #[serde(default)]
    taxonomies: Vec<TaxonomyRecord>,
    items: Vec<ItemRecord>,
}

#[derive(Debug, Deserialize)]
struct TaxonomyRecord {
    id: String,
    object_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ItemRecord {
    id: u64,
    #[serde(default = "default_kind")]
    kind: String,
    status: String,
    title: String,
    slug: Option<String>,
    #[serde(default)]
    body: String,
    modified_at: Option<DateTime<Utc>>,
    /// taxonomy id -> terms
    #[serde(default)]
    terms: BTreeMap<String, Vec<String>>,
}

fn default_kind() -> String {
    "post".into()
}

impl ItemRecord {
    fn to_item(&self) -> Item {
        let mut item = Item::new(self.id, &self.kind, &self.status, &self.title, &self.body);
        if let Some(slug) = &self.slug {
            item = item.with_slug(slug);
        }
        if let Some(at) = self.modified_at {
            item = item.with_modified_at(at);
        }
        item
    }
}

fn parse(path: &Path) -> Result<ImportFile> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn run(args: ImportArgs, config: &BacklinksConfig) -> Result<()> {
    let path = &args.file;
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let file = parse(path)?;
    println!(
        "Parsed {} taxonomies and {} items from {}",
        file.taxonomies.len(),
        file.items.len(),
        path.display()
    );

    if args.dry_run {
        println!("Dry run: no changes written.");
        for record in &file.items {
            println!("  [{}] {} ({})", record.kind, record.title, record.id);
        }
        return Ok(());
    }

    let index = open_index(config)?;

    for record in &file.taxonomies {
        index.register_taxonomy(&Taxonomy {
            id: record.id.clone(),
            object_types: record.object_types.clone(),
            public: true,
        })?;
    }

    // Store every item before scanning so links between them resolve.
    let mut stored = Vec::with_capacity(file.items.len());
    let mut errors = 0;
    for record in &file.items {
        let item = record.to_item();
        let before = index.get_item(item.id)?.map(|i| i.status);
        if let Err(e) = index.put_item(&item) {
            eprintln!("  Error storing item {}: {}", record.id, e);
            errors += 1;
            continue;
        }
        for (taxonomy, terms) in &record.terms {
            if let Err(e) = index.assign_terms(item.id, taxonomy, terms) {
                eprintln!("  Error tagging item {} in '{}': {}", record.id, taxonomy, e);
                errors += 1;
            }
        }
        stored.push((item, before));
    }
    println!("Imported {} items ({} errors)", stored.len(), errors);

    if !args.scan {
        return Ok(());
    }

    let (mut scanned, mut skipped) = (0, 0);
    for (item, before) in stored {
        let id: ItemId = item.id;
        let new = item.status.clone();
        let event = ItemEvent::StatusTransition {
            item,
            previous: before.unwrap_or_else(|| "new".into()),
            new,
        };
        match index.handle(event) {
            Ok(EventOutcome::Scan(ScanOutcome::Scanned(_))) => scanned += 1,
            Ok(_) => skipped += 1,
            Err(e) => eprintln!("  Scan of item {} failed: {}", id, e),
        }
    }
    println!("Scanned {} items, {} skipped", scanned, skipped);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import_document() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("items.json");
        std::fs::write(
            &path,
            r#"{
                "taxonomies": [{"id": "tag", "object_types": ["post"]}],
                "items": [
                    {"id": 1, "status": "publish", "title": "Hello World",
                     "body": "<a href=\"/?p=2\">two</a>", "terms": {"tag": ["intro"]}},
                    {"id": 2, "kind": "page", "status": "draft", "title": "Two", "slug": "second"}
                ]
            }"#,
        )
        .unwrap();

        let file = parse(&path).unwrap();
        assert_eq!(file.taxonomies[0].id, "tag");

        let first = file.items[0].to_item();
        assert_eq!(first.kind, "post");
        assert_eq!(first.slug, "hello-world");
        assert_eq!(file.items[0].terms["tag"], vec!["intro"]);

        let second = file.items[1].to_item();
        assert_eq!(second.kind, "page");
        assert_eq!(second.slug, "second");
        assert!(second.body.is_empty());
    }
}
