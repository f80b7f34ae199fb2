use crate::cli::{is_json, open_index, print_json, FormatArgs, WorkerArgs};
use crate::config::BacklinksConfig;
use anyhow::Result;
use backlinks_core::{Backlinks, EventOutcome, ItemEvent, TickOutcome};
use std::time::Duration;
use tracing::{error, info};

pub fn tick(config: &BacklinksConfig) -> Result<()> {
    let index = open_index(config)?;
    let outcome = index.tick()?;
    let message = match outcome {
        TickOutcome::NoBacklog => "Nothing to do: every tracked item is scanned.",
        TickOutcome::AlreadyScheduled => "A drain is already scheduled.",
        TickOutcome::Locked => "Another worker holds the backlog lock.",
        TickOutcome::Scheduled => "Drain scheduled.",
    };
    println!("{}", message);
    Ok(())
}

pub fn drain(args: FormatArgs, config: &BacklinksConfig) -> Result<()> {
    let json = is_json(&args.format)?;
    let index = open_index(config)?;
    let report = index.drain()?;

    if json {
        return print_json(&report);
    }
    println!("{}", report.summary());
    for id in &report.failed {
        println!("  failed: {}", id);
    }
    Ok(())
}

/// One pass of the worker loop: arm a drain if needed, then run it if due.
fn step(index: &Backlinks) -> Result<()> {
    if let EventOutcome::Tick(TickOutcome::Scheduled) = index.handle(ItemEvent::RequestFinished)? {
        info!("Backlog drain scheduled");
    }
    if let EventOutcome::Drain(Some(_)) = index.handle(ItemEvent::BacklogDue)? {
        info!("{}", index.backlog().metrics().summary());
    }
    Ok(())
}

pub async fn run(args: WorkerArgs, config: &BacklinksConfig) -> Result<()> {
    let index = open_index(config)?;
    let secs = args.interval.unwrap_or(config.backlog.poll_interval_secs);
    if secs == 0 {
        anyhow::bail!("--interval must be > 0");
    }

    info!(
        "Backlog worker started (poll every {}s, batch {}, delay {}s)",
        secs, config.backlog.batch_size, config.backlog.delay_secs
    );

    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = step(&index) {
                    error!("Backlog worker step failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, terminating...");
                break;
            }
        }
    }

    Ok(())
}
