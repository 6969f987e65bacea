// crates/hanzi-ref-core/src/interfaces/mod.rs
// ============================================================================
// Module: Hanzi Reference Interfaces
// Description: Backend-agnostic storage interface for character lookups.
// Purpose: Let the router own any storage engine behind one trait.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! [`CharacterBackend`] is the query executor seam. The router thread owns
//! exactly one backend value and calls it sequentially, so implementations
//! need `Send` but never `Sync`, and may keep `&mut self` state such as a
//! connection or prepared statements.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

use crate::core::CharacterRecord;
use crate::core::LookupFilter;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Storage backend errors.
///
/// # Invariants
/// - Messages never embed record payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend cannot be opened or reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    /// The backend failed to execute a query.
    #[error("query failed: {0}")]
    QueryFailed(String),
    /// A row could not be materialized into a [`CharacterRecord`].
    #[error("row decode failed (id {}): {message}", display_row_id(.row_id))]
    DecodeFailed {
        /// Row id when it could be read.
        row_id: Option<i64>,
        /// Decode failure description.
        message: String,
    },
}

/// Formats an optional row id for error messages.
fn display_row_id(row_id: &Option<i64>) -> String {
    row_id.map_or_else(|| "unknown".to_string(), |id| id.to_string())
}

// ============================================================================
// SECTION: Query Output
// ============================================================================

/// Records produced by one backend query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryRows {
    /// Decoded records, frequency descending, at most the requested limit.
    pub records: Vec<CharacterRecord>,
    /// Rows skipped because they failed to decode.
    pub skipped: Vec<BackendError>,
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// Storage backend that executes lookup filters.
pub trait CharacterBackend: Send {
    /// Executes a filter and returns at most `limit` records ordered by
    /// frequency descending (ties broken by ascending id).
    ///
    /// Rows that fail to decode are reported in [`QueryRows::skipped`]
    /// instead of failing the whole query.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::QueryFailed`] when the query cannot run.
    fn query(&mut self, filter: &LookupFilter, limit: usize) -> Result<QueryRows, BackendError>;
}

impl<B: CharacterBackend + ?Sized> CharacterBackend for Box<B> {
    fn query(&mut self, filter: &LookupFilter, limit: usize) -> Result<QueryRows, BackendError> {
        (**self).query(filter, limit)
    }
}
