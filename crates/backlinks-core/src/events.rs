//! Lifecycle events the host forwards to the index.

use crate::backlog::{BacklogScheduler, TickOutcome};
use crate::error::Result;
use crate::metrics::DrainReport;
use crate::resolver::UrlResolver;
use crate::scan::ScanCoordinator;
use crate::store::{GraphStore, Scheduler};
use crate::types::{Item, ScanOutcome};

#[derive(Debug, Clone)]
pub enum ItemEvent {
    /// An item was saved or changed status.
    StatusTransition {
        item: Item,
        previous: String,
        new: String,
    },
    /// A request finished; a good moment to check the backlog.
    RequestFinished,
    /// The deferred backlog drain may be due.
    BacklogDue,
}

#[derive(Debug, Clone)]
pub enum EventOutcome {
    Scan(ScanOutcome),
    Tick(TickOutcome),
    /// `None` when no drain was due yet.
    Drain(Option<DrainReport>),
}

pub fn dispatch<S, R>(
    scanner: &ScanCoordinator<S, R>,
    backlog: &BacklogScheduler<S, R>,
    event: ItemEvent,
) -> Result<EventOutcome>
where
    S: GraphStore + Scheduler,
    R: UrlResolver,
{
    match event {
        ItemEvent::StatusTransition {
            item,
            previous,
            new,
        } => scanner
            .on_status_transition(&item, &previous, &new)
            .map(EventOutcome::Scan),
        ItemEvent::RequestFinished => backlog.tick().map(EventOutcome::Tick),
        ItemEvent::BacklogDue => backlog.fire_due().map(EventOutcome::Drain),
    }
}
