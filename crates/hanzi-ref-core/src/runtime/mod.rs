// crates/hanzi-ref-core/src/runtime/mod.rs
// ============================================================================
// Module: Hanzi Reference Runtime
// Description: Request router, response cache, and reference store facade.
// Purpose: Serialize storage access and cache phonetic lookups.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The runtime owns the single router thread and everything it touches: the
//! backend, the response cache, and the cache snapshot written at shutdown.

pub mod cache;
pub mod memory;
pub mod router;
pub mod snapshot;
pub mod store;

pub use cache::CacheKey;
pub use cache::ResponseCache;
pub use memory::InMemoryCharacterBackend;
pub use router::Lookup;
pub use router::LookupSource;
pub use router::RouterState;
pub use router::RouterStatsSnapshot;
pub use snapshot::MAX_SNAPSHOT_BYTES;
pub use snapshot::SNAPSHOT_FORMAT;
pub use snapshot::SNAPSHOT_VERSION;
pub use snapshot::SnapshotError;
pub use snapshot::load_snapshot;
pub use snapshot::save_snapshot;
pub use store::CacheSettings;
pub use store::DEFAULT_QUEUE_CAPACITY;
pub use store::ReferenceStore;
pub use store::ReferenceStoreConfig;
pub use store::ShutdownReport;
pub use store::StoreError;
