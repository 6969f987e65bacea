// crates/hanzi-ref-core/src/lib.rs
// ============================================================================
// Module: Hanzi Reference Core Library
// Description: Public API surface for the hanzi-ref core.
// Purpose: Expose the data model, backend interface, and reference store runtime.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Hanzi reference core answers structured dictionary lookups (by character,
//! by either phonetic transcription, or by definition fragment). All storage
//! access is serialized through a single worker thread that owns the backend
//! and the response cache; callers only talk to it through message passing.
//! The storage engine itself sits behind [`CharacterBackend`] so the `SQLite`
//! implementation and test doubles are interchangeable.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::BackendError;
pub use interfaces::CharacterBackend;
pub use interfaces::QueryRows;
pub use runtime::CacheKey;
pub use runtime::CacheSettings;
pub use runtime::DEFAULT_QUEUE_CAPACITY;
pub use runtime::InMemoryCharacterBackend;
pub use runtime::Lookup;
pub use runtime::LookupSource;
pub use runtime::MAX_SNAPSHOT_BYTES;
pub use runtime::ReferenceStore;
pub use runtime::ReferenceStoreConfig;
pub use runtime::ResponseCache;
pub use runtime::RouterState;
pub use runtime::RouterStatsSnapshot;
pub use runtime::SNAPSHOT_FORMAT;
pub use runtime::SNAPSHOT_VERSION;
pub use runtime::ShutdownReport;
pub use runtime::SnapshotError;
pub use runtime::StoreError;
pub use runtime::load_snapshot;
pub use runtime::save_snapshot;
