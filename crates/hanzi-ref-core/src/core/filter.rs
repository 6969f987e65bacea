// crates/hanzi-ref-core/src/core/filter.rs
// ============================================================================
// Module: Lookup Filters
// Description: Partial-match queries over character records.
// Purpose: Describe which record dimensions a lookup constrains.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`LookupFilter`] is a partial [`CharacterRecord`]: every dimension is
//! optional and an unset dimension matches anything. Text dimensions match by
//! ASCII-case-insensitive substring containment; tone and id match exactly.
//! Backends must apply the filter as an AND of independent predicates, so
//! [`LookupFilter::matches`] is the reference semantics every backend follows.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::phonetic::normalize;
use crate::core::record::CharacterRecord;

// ============================================================================
// SECTION: Tone
// ============================================================================

/// Tone value rejected because it lies outside 0-6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tone out of range: {0} (expected 0-6)")]
pub struct ToneError(pub i64);

/// Pronunciation tone in the range 0-6.
///
/// # Invariants
/// - The wrapped value is always `<= Tone::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Tone(u8);

impl Tone {
    /// Highest valid tone.
    pub const MAX: u8 = 6;

    /// Creates a tone when the value is in range.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX { Some(Self(value)) } else { None }
    }

    /// Parses a single ASCII digit `0`-`6`.
    #[must_use]
    pub fn from_digit(digit: char) -> Option<Self> {
        let value = digit.to_digit(10)?;
        u8::try_from(value).ok().and_then(Self::new)
    }

    /// Returns the numeric tone.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Tone {
    type Error = ToneError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        u8::try_from(value).ok().and_then(Self::new).ok_or(ToneError(value))
    }
}

impl From<Tone> for i64 {
    fn from(tone: Tone) -> Self {
        Self::from(tone.0)
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// SECTION: Phonetic System
// ============================================================================

/// The two parallel phonetic transcription systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhoneticSystem {
    /// Zhuyin (bopomofo).
    Zhuyin,
    /// Pinyin romanization.
    Pinyin,
}

impl PhoneticSystem {
    /// Both systems, in cache lookup order.
    pub const ALL: [Self; 2] = [Self::Zhuyin, Self::Pinyin];

    /// Returns a stable label for logs and snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zhuyin => "zhuyin",
            Self::Pinyin => "pinyin",
        }
    }
}

impl fmt::Display for PhoneticSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Lookup Filter
// ============================================================================

/// Partial-match query over character records.
///
/// # Invariants
/// - `None` means "match anything" in that dimension.
/// - Text dimensions built through the constructors are trimmed and non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupFilter {
    /// Exact record id.
    pub id: Option<i64>,
    /// Substring of the character field.
    pub character: Option<String>,
    /// Substring of the zhuyin field.
    pub zhuyin: Option<String>,
    /// Substring of the pinyin field.
    pub pinyin: Option<String>,
    /// Exact tone.
    pub tone: Option<Tone>,
    /// Substring of the definition field.
    pub definition: Option<String>,
}

impl LookupFilter {
    /// Builds a filter on the character field.
    #[must_use]
    pub fn by_character(term: &str) -> Self {
        Self {
            character: non_empty(term),
            ..Self::default()
        }
    }

    /// Builds a filter on one phonetic field, splitting off a trailing tone.
    #[must_use]
    pub fn by_phonetic(system: PhoneticSystem, term: &str) -> Self {
        let term = normalize(term);
        let stem = non_empty(&term.stem);
        let mut filter = Self {
            tone: term.tone,
            ..Self::default()
        };
        match system {
            PhoneticSystem::Zhuyin => filter.zhuyin = stem,
            PhoneticSystem::Pinyin => filter.pinyin = stem,
        }
        filter
    }

    /// Builds a filter on the definition field.
    #[must_use]
    pub fn by_definition(term: &str) -> Self {
        Self {
            definition: non_empty(term),
            ..Self::default()
        }
    }

    /// Returns the phonetic term constrained for the given system.
    #[must_use]
    pub fn phonetic(&self, system: PhoneticSystem) -> Option<&str> {
        match system {
            PhoneticSystem::Zhuyin => self.zhuyin.as_deref(),
            PhoneticSystem::Pinyin => self.pinyin.as_deref(),
        }
    }

    /// Returns true when only phonetic dimensions (and tone) are constrained.
    #[must_use]
    pub const fn is_phonetic_only(&self) -> bool {
        self.id.is_none() && self.character.is_none() && self.definition.is_none()
    }

    /// Evaluates the filter against a record.
    #[must_use]
    pub fn matches(&self, record: &CharacterRecord) -> bool {
        self.id.is_none_or(|id| id == record.id)
            && text_matches(self.character.as_deref(), &record.character)
            && text_matches(self.zhuyin.as_deref(), &record.zhuyin)
            && text_matches(self.pinyin.as_deref(), &record.pinyin)
            && self.tone.is_none_or(|tone| record.tone == Some(tone))
            && text_matches(self.definition.as_deref(), &record.definition)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Trims a term and maps the empty string to `None`.
fn non_empty(term: &str) -> Option<String> {
    let trimmed = term.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

/// Applies an optional substring predicate.
fn text_matches(needle: Option<&str>, haystack: &str) -> bool {
    needle.is_none_or(|needle| contains_ignore_ascii_case(haystack, needle))
}

/// Substring test that folds ASCII case only, like `SQLite` `LIKE`.
fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}
