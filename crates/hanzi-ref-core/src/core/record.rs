// crates/hanzi-ref-core/src/core/record.rs
// ============================================================================
// Module: Character Records
// Description: Dictionary entry values and capped, immutable result sets.
// Purpose: Carry lookup outcomes between the router, the cache, and callers.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`CharacterRecord`] is a value copy of one `characters` row. A
//! [`ResultSet`] is the ordered, capped outcome of one lookup. Result sets are
//! reference counted so a cache entry and any number of callers can hold the
//! same records; nothing can mutate them after construction.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

use crate::core::filter::PhoneticSystem;
use crate::core::filter::Tone;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of records carried by a single result set.
pub const MAX_RESULTS: usize = 50;
/// Maximum number of codepoints in a record's character field.
pub const MAX_CHARACTER_CODEPOINTS: usize = 4;

// ============================================================================
// SECTION: Character Record
// ============================================================================

/// One dictionary entry as read from storage.
///
/// Field names serialize in the `PascalCase` form used by the JSON response
/// envelope (`Id`, `Character`, `Zhuyin`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CharacterRecord {
    /// Storage identity.
    pub id: i64,
    /// The character itself (at most [`MAX_CHARACTER_CODEPOINTS`] codepoints).
    pub character: String,
    /// Zhuyin (bopomofo) transcription.
    pub zhuyin: String,
    /// Pinyin romanization.
    pub pinyin: String,
    /// Tone, when known.
    pub tone: Option<Tone>,
    /// Free-text English definition.
    pub definition: String,
    /// Frequency rank; higher is more common.
    pub freq: i64,
}

impl CharacterRecord {
    /// Returns the transcription for the given phonetic system.
    #[must_use]
    pub fn phonetic(&self, system: PhoneticSystem) -> &str {
        match system {
            PhoneticSystem::Zhuyin => &self.zhuyin,
            PhoneticSystem::Pinyin => &self.pinyin,
        }
    }
}

// ============================================================================
// SECTION: Result Set
// ============================================================================

/// Ordered, capped, immutable lookup outcome.
///
/// # Invariants
/// - Holds at most [`MAX_RESULTS`] records.
/// - Record order is fixed at construction (frequency descending when built by
///   a backend).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    /// Shared record storage.
    records: Arc<[CharacterRecord]>,
}

impl ResultSet {
    /// Builds a result set, keeping the first [`MAX_RESULTS`] records.
    #[must_use]
    pub fn from_records(mut records: Vec<CharacterRecord>) -> Self {
        records.truncate(MAX_RESULTS);
        Self {
            records: Arc::from(records),
        }
    }

    /// Returns an empty result set.
    #[must_use]
    pub fn empty() -> Self {
        Self::from_records(Vec::new())
    }

    /// Returns the records in order.
    #[must_use]
    pub fn records(&self) -> &[CharacterRecord] {
        &self.records
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true when there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the first (most frequent) record.
    #[must_use]
    pub fn first(&self) -> Option<&CharacterRecord> {
        self.records.first()
    }

    /// Returns an iterator over the records.
    pub fn iter(&self) -> std::slice::Iter<'_, CharacterRecord> {
        self.records.iter()
    }

    /// Returns true when both sets share the same underlying storage.
    #[must_use]
    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.records, &other.records)
    }
}

impl Default for ResultSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type IntoIter = std::slice::Iter<'a, CharacterRecord>;
    type Item = &'a CharacterRecord;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResultSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<CharacterRecord>::deserialize(deserializer)?;
        if records.len() > MAX_RESULTS {
            return Err(serde::de::Error::custom(format!(
                "result set exceeds {MAX_RESULTS} records"
            )));
        }
        Ok(Self::from_records(records))
    }
}
