pub mod catalog;
pub mod config;
pub mod index;
pub mod matcher;
pub mod memory;
pub mod merge;
pub mod normalize;
pub mod scan;
pub mod store;

pub use catalog::{Catalog, CatalogError, ImportReport, UpsertOutcome};
pub use config::{CatalogConfig, ConfigError};
pub use index::{CatalogStats, SongIndex};
pub use matcher::{find_match, MatchTolerances};
pub use memory::MemoryStore;
pub use merge::merge;
pub use normalize::{identity_key, normalize, normalize_text};
pub use scan::scan_local_tracks;
pub use store::{DurationRange, SongStore, StoreError};
