use crate::cli::{
    is_json, open_index, print_item_table, print_json, truncate, DeregisterArgs, FormatArgs,
    RescanArgs,
};
use crate::config::BacklinksConfig;
use anyhow::Result;
use backlinks_core::{ItemId, ScanOutcome};

pub fn rescan(args: RescanArgs, config: &BacklinksConfig) -> Result<()> {
    let json = is_json(&args.format)?;
    let index = open_index(config)?;

    let items = if args.ids.is_empty() {
        index.eligible_items()?
    } else {
        let mut items = Vec::with_capacity(args.ids.len());
        for id in &args.ids {
            match index.get_item(ItemId(*id))? {
                Some(item) => items.push(item),
                None => eprintln!("  No such item: {}", id),
            }
        }
        items
    };

    let mut rows = Vec::with_capacity(items.len());
    for item in &items {
        match index.scan(item.id)? {
            ScanOutcome::Ineligible(reason) => eprintln!("  Skipped item {}: {}", item.id, reason),
            outcome => rows.push((item, outcome.targets().len())),
        }
    }

    if json {
        let out: Vec<_> = rows
            .iter()
            .map(|(item, outgoing)| {
                serde_json::json!({
                    "id": item.id,
                    "type": item.kind,
                    "status": item.status,
                    "title": item.title,
                    "outgoing": outgoing,
                })
            })
            .collect();
        return print_json(&out);
    }

    if rows.is_empty() {
        println!("(no items)");
        return Ok(());
    }
    println!(
        "{:<8}  {:<8}  {:<8}  {:<40}  {}",
        "ID", "TYPE", "STATUS", "TITLE", "OUTGOING"
    );
    println!("{}", "─".repeat(80));
    for (item, outgoing) in &rows {
        println!(
            "{:<8}  {:<8}  {:<8}  {:<40}  {}",
            item.id,
            item.kind,
            item.status,
            truncate(&item.title, 40),
            outgoing
        );
    }
    Ok(())
}

pub fn unscanned(args: FormatArgs, config: &BacklinksConfig) -> Result<()> {
    let json = is_json(&args.format)?;
    let index = open_index(config)?;
    let items = index.unregistered_items()?;

    if json {
        return print_json(&items);
    }
    print_item_table("Unscanned items", &items);
    Ok(())
}

pub fn deregister(args: DeregisterArgs, config: &BacklinksConfig) -> Result<()> {
    let index = open_index(config)?;

    if args.all {
        let count = index.deregister_all()?;
        println!("Deregistered {} items", count);
        return Ok(());
    }
    if args.ids.is_empty() {
        anyhow::bail!("Give one or more item ids, or --all");
    }

    for id in args.ids {
        let removed = index.deregister(ItemId(id))?;
        println!("Item {}: removed {} outgoing links", id, removed.len());
    }
    Ok(())
}
