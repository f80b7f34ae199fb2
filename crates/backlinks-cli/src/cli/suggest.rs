use crate::cli::{is_json, open_index, print_item_table, print_json, truncate, SuggestArgs};
use crate::config::BacklinksConfig;
use anyhow::Result;
use backlinks_core::{Backlinks, ItemId, Suggestion};

pub fn run(args: SuggestArgs, config: &BacklinksConfig) -> Result<()> {
    let json = is_json(&args.format)?;
    let index = open_index(config)?;
    let id = ItemId(args.id);

    let item = match index.get_item(id)? {
        Some(item) if config.graph_config().is_eligible(&item) => item,
        _ => anyhow::bail!("No such eligible item: {}", id),
    };

    let suggestions = index.suggestions_for_item(id)?;

    if json {
        return print_json(&serde_json::json!({
            "item": item,
            "over_common_threshold": index.over_common_threshold()?,
            "suggestions": suggestions,
        }));
    }

    if args.verbose {
        print_item_table("This item", std::slice::from_ref(&item));
        verbose(&index, id)?;
    }

    print_suggestions("Incoming link suggestions", &suggestions);
    Ok(())
}

/// Per-taxonomy candidates in both directions. Outgoing candidates already
/// listed under an earlier taxonomy are not repeated.
fn verbose(index: &Backlinks, id: ItemId) -> Result<()> {
    let taxonomies = index.suggestion_taxonomies(id)?;
    println!(
        "Terms used by {} or more published items are ignored.",
        index.over_common_threshold()?
    );
    println!();

    let outgoing = index.outgoing(id)?;
    print_item_table("Outgoing links", &outgoing);
    let mut exclude: Vec<ItemId> = outgoing.iter().map(|i| i.id).collect();
    for taxonomy in &taxonomies {
        let candidates = index.suggestions_by_taxonomy(id, &taxonomy.id, &exclude)?;
        print_item_table(
            &format!("Outgoing link suggestions based on taxonomy '{}'", taxonomy.id),
            &candidates,
        );
        exclude.extend(candidates.iter().map(|i| i.id));
    }

    let incoming = index.incoming(id)?;
    print_item_table("Incoming links", &incoming);
    let exclude: Vec<ItemId> = incoming.iter().map(|i| i.id).collect();
    for taxonomy in &taxonomies {
        let candidates = index.suggestions_by_taxonomy(id, &taxonomy.id, &exclude)?;
        print_item_table(
            &format!("Incoming link suggestions based on taxonomy '{}'", taxonomy.id),
            &candidates,
        );
    }
    Ok(())
}

fn print_suggestions(header: &str, suggestions: &[Suggestion]) {
    if suggestions.is_empty() {
        println!("{} - none", header);
        return;
    }
    println!("{}", header);
    println!(
        "{:<8}  {:<8}  {:<8}  {:<40}  {:>6}",
        "ID", "TYPE", "STATUS", "TITLE", "SHARED"
    );
    println!("{}", "─".repeat(80));
    for s in suggestions {
        println!(
            "{:<8}  {:<8}  {:<8}  {:<40}  {:>6}",
            s.item.id,
            s.item.kind,
            s.item.status,
            truncate(&s.item.title, 40),
            s.score
        );
    }
}
