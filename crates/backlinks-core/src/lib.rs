pub mod types;
pub mod error;
pub mod config;
pub mod store;
pub mod resolver;
pub mod extract;
pub mod edges;
pub mod counts;
pub mod scan;
pub mod suggest;
pub mod metrics;
pub mod backlog;
pub mod events;
pub mod api;

pub use error::{BacklinksError, Result};
pub use types::*;
pub use config::{BacklogConfig, GraphConfig};
pub use store::{
    Clock, GraphStore, ItemCatalog, ItemFilter, ManualClock, MetaStore, RedbStore, Scheduler,
    SystemClock, TagStore, CURRENT_SCHEMA_VERSION,
};
pub use resolver::{SiteResolver, UrlResolver};
pub use extract::{anchor_hrefs, LinkExtractor};
pub use edges::{edge_label, parse_edge_label, EdgeStore};
pub use counts::CountLabels;
pub use scan::ScanCoordinator;
pub use suggest::SuggestionEngine;
pub use metrics::{BacklogMetrics, DrainReport};
pub use backlog::{BacklogScheduler, BacklogState, TickOutcome};
pub use events::{EventOutcome, ItemEvent};
pub use api::{Backlinks, IndexStatus, LibraryConfig};
