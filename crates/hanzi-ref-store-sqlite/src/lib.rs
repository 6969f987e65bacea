// crates/hanzi-ref-store-sqlite/src/lib.rs
// ============================================================================
// Module: Hanzi Reference SQLite Backend
// Description: SQLite implementation of the character backend.
// Purpose: Provide the dictionary storage behind the reference store.
// Dependencies: hanzi-ref-core, rusqlite
// ============================================================================

//! ## Overview
//! Opens the dictionary database and answers lookup filters with ordered,
//! capped queries. [`open_reference_store`] wires the backend into a running
//! [`hanzi_ref_core::ReferenceStore`].

pub mod store;

pub use store::DEFAULT_BUSY_TIMEOUT_MS;
pub use store::SqliteBackendConfig;
pub use store::SqliteCharacterBackend;
pub use store::SqliteJournalMode;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
pub use store::open_reference_store;
