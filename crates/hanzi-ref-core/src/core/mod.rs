// crates/hanzi-ref-core/src/core/mod.rs
// ============================================================================
// Module: Hanzi Reference Core Types
// Description: Data model for dictionary records, filters, and envelopes.
// Purpose: Group the value types shared by the runtime and storage backends.
// Dependencies: serde, sha2, thiserror
// ============================================================================

//! ## Overview
//! Value types only: nothing in this module touches storage or threads.

pub mod envelope;
pub mod filter;
pub mod hashing;
pub mod phonetic;
pub mod record;

pub use envelope::LookupKind;
pub use envelope::ResponseEnvelope;
pub use envelope::UnknownLookupKind;
pub use filter::LookupFilter;
pub use filter::PhoneticSystem;
pub use filter::Tone;
pub use filter::ToneError;
pub use phonetic::MAX_STEM_CHARS;
pub use phonetic::PhoneticTerm;
pub use phonetic::normalize;
pub use record::CharacterRecord;
pub use record::MAX_CHARACTER_CODEPOINTS;
pub use record::MAX_RESULTS;
pub use record::ResultSet;
