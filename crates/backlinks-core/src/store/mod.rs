mod clock;
mod filters;
mod redb_store;
mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use filters::ItemFilter;
pub use redb_store::{RedbStore, CURRENT_SCHEMA_VERSION};
pub use traits::{GraphStore, ItemCatalog, MetaStore, Scheduler, TagStore};
