// crates/hanzi-ref-core/src/core/envelope.rs
// ============================================================================
// Module: Response Envelope
// Description: Lookup verbs and the JSON envelope returned to front ends.
// Purpose: Map `zhuyin|pinyin|def|char` verbs to filters and frame results.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Front ends address the reference store with a verb plus a raw term and
//! return `{SessionID, ResponseType, Data, Timestamp}`. The numeric response
//! type is stable: zhuyin 0, pinyin 1, definition 2, character 3.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

use crate::core::filter::LookupFilter;
use crate::core::filter::PhoneticSystem;
use crate::core::record::ResultSet;

/// Lookup verb understood by front ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Lookup by zhuyin transcription.
    Zhuyin,
    /// Lookup by pinyin transcription.
    Pinyin,
    /// Lookup by definition fragment.
    Definition,
    /// Lookup by character.
    Character,
}

impl LookupKind {
    /// Returns the numeric response type for the envelope.
    #[must_use]
    pub const fn response_type(self) -> u8 {
        match self {
            Self::Zhuyin => 0,
            Self::Pinyin => 1,
            Self::Definition => 2,
            Self::Character => 3,
        }
    }

    /// Returns the verb as written on the wire.
    #[must_use]
    pub const fn verb(self) -> &'static str {
        match self {
            Self::Zhuyin => "zhuyin",
            Self::Pinyin => "pinyin",
            Self::Definition => "def",
            Self::Character => "char",
        }
    }

    /// Builds the filter for a raw term of this kind.
    #[must_use]
    pub fn filter(self, term: &str) -> LookupFilter {
        match self {
            Self::Zhuyin => LookupFilter::by_phonetic(PhoneticSystem::Zhuyin, term),
            Self::Pinyin => LookupFilter::by_phonetic(PhoneticSystem::Pinyin, term),
            Self::Definition => LookupFilter::by_definition(term),
            Self::Character => LookupFilter::by_character(term),
        }
    }
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Verb not recognized by [`LookupKind::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown lookup kind: {0} (expected zhuyin, pinyin, def, or char)")]
pub struct UnknownLookupKind(pub String);

impl FromStr for LookupKind {
    type Err = UnknownLookupKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "zhuyin" => Ok(Self::Zhuyin),
            "pinyin" => Ok(Self::Pinyin),
            "def" => Ok(Self::Definition),
            "char" => Ok(Self::Character),
            other => Err(UnknownLookupKind(other.to_string())),
        }
    }
}

/// JSON envelope returned for one lookup.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    /// Caller-supplied session identifier.
    #[serde(rename = "SessionID")]
    pub session_id: String,
    /// Numeric lookup kind ([`LookupKind::response_type`]).
    #[serde(rename = "ResponseType")]
    pub response_type: u8,
    /// Matched records.
    #[serde(rename = "Data")]
    pub data: ResultSet,
    /// Unix timestamp in milliseconds.
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
}

impl ResponseEnvelope {
    /// Frames a result set for the given lookup kind.
    #[must_use]
    pub fn new(
        session_id: impl Into<String>,
        kind: LookupKind,
        data: ResultSet,
        timestamp: i64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            response_type: kind.response_type(),
            data,
            timestamp,
        }
    }
}
