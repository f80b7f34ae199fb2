use crate::cli::{is_json, open_index, print_item_table, print_json, truncate, ShowArgs, StatusArgs};
use crate::config::BacklinksConfig;
use anyhow::Result;
use backlinks_core::{Item, ItemId};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Serialize)]
struct StatusRow {
    id: ItemId,
    #[serde(rename = "type")]
    kind: String,
    status: String,
    title: String,
    incoming: u64,
    outgoing: u64,
}

pub fn status(args: StatusArgs, config: &BacklinksConfig) -> Result<()> {
    let json = is_json(&args.format)?;
    let index = open_index(config)?;

    // incoming count -> rows, ascending
    let mut pools: BTreeMap<u64, Vec<StatusRow>> = BTreeMap::new();
    for item in index.eligible_items()? {
        let incoming = index.incoming(item.id)?.len() as u64;
        let outgoing = index.outgoing(item.id)?.len() as u64;
        pools.entry(incoming).or_default().push(StatusRow {
            id: item.id,
            kind: item.kind,
            status: item.status,
            title: item.title,
            incoming,
            outgoing,
        });
    }
    if let Some(max) = args.max {
        pools.retain(|count, _| *count <= max);
    }

    if json {
        let rows: Vec<&StatusRow> = pools.values().flatten().collect();
        return print_json(&rows);
    }

    let summary = index.status()?;
    println!();
    println!("Backlink Index");
    println!("{}", "─".repeat(50));
    println!("Tracked:      {:>8}", summary.eligible);
    println!("Scanned:      {:>8}", summary.registered);
    println!("Unscanned:    {:>8}", summary.unregistered);
    println!("Backlog:      {:>8}", summary.backlog_state);
    println!("{}", "─".repeat(50));
    println!();

    for (count, rows) in &pools {
        println!("Found {} items with {} backlinks", rows.len(), count);
        println!(
            "{:<8}  {:<8}  {:<8}  {:<40}  {:>8}  {:>8}",
            "ID", "TYPE", "STATUS", "TITLE", "IN", "OUT"
        );
        println!("{}", "─".repeat(90));
        for row in rows {
            println!(
                "{:<8}  {:<8}  {:<8}  {:<40}  {:>8}  {:>8}",
                row.id,
                row.kind,
                row.status,
                truncate(&row.title, 40),
                row.incoming,
                row.outgoing
            );
        }
        println!();
    }
    Ok(())
}

#[derive(Serialize)]
struct ShowReport {
    item: Item,
    scanned: bool,
    outgoing: Vec<Item>,
    incoming: Vec<Item>,
}

pub fn show(args: ShowArgs, config: &BacklinksConfig) -> Result<()> {
    let json = is_json(&args.format)?;
    let index = open_index(config)?;
    let id = ItemId(args.id);

    let item = match index.get_item(id)? {
        Some(item) if config.graph_config().is_eligible(&item) => item,
        _ => anyhow::bail!("No such eligible item: {}", id),
    };

    let report = ShowReport {
        scanned: index.scan_state(id)?.is_some(),
        outgoing: index.outgoing(id)?,
        incoming: index.incoming(id)?,
        item,
    };

    if json {
        return print_json(&report);
    }

    print_item_table("This item", std::slice::from_ref(&report.item));
    if !report.scanned {
        println!("(not scanned yet)");
        println!();
    }
    print_item_table(
        &format!("Found {} outgoing links.", report.outgoing.len()),
        &report.outgoing,
    );
    print_item_table(
        &format!("Found {} incoming links.", report.incoming.len()),
        &report.incoming,
    );
    Ok(())
}
