// crates/hanzi-ref-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Character Backend
// Description: Vector-backed CharacterBackend for tests and examples.
// Purpose: Provide a storage-free backend with the same filter semantics.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Applies [`LookupFilter::matches`] over a fixed record list, ordered by
//! frequency descending and id ascending, capped at the requested limit.

use crate::core::CharacterRecord;
use crate::core::LookupFilter;
use crate::interfaces::BackendError;
use crate::interfaces::CharacterBackend;
use crate::interfaces::QueryRows;

/// In-memory character backend for tests and examples.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCharacterBackend {
    /// Records in insertion order.
    records: Vec<CharacterRecord>,
}

impl InMemoryCharacterBackend {
    /// Creates a backend over the given records.
    #[must_use]
    pub const fn new(records: Vec<CharacterRecord>) -> Self {
        Self {
            records,
        }
    }

    /// Adds a record.
    pub fn insert(&mut self, record: CharacterRecord) {
        self.records.push(record);
    }
}

impl CharacterBackend for InMemoryCharacterBackend {
    fn query(&mut self, filter: &LookupFilter, limit: usize) -> Result<QueryRows, BackendError> {
        let mut records: Vec<CharacterRecord> =
            self.records.iter().filter(|record| filter.matches(record)).cloned().collect();
        records.sort_by(|a, b| b.freq.cmp(&a.freq).then_with(|| a.id.cmp(&b.id)));
        records.truncate(limit);
        Ok(QueryRows {
            records,
            skipped: Vec::new(),
        })
    }
}
