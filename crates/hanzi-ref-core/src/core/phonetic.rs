// crates/hanzi-ref-core/src/core/phonetic.rs
// ============================================================================
// Module: Phonetic Normalizer
// Description: Splits a phonetic query term into stem and tone.
// Purpose: Canonicalize zhuyin/pinyin input before filtering and caching.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A phonetic term is recognized as toned when, after trimming, it is a stem
//! of 1 to [`MAX_STEM_CHARS`] characters containing no ASCII digit, followed
//! by exactly one trailing digit in `0`-`6`. Every other input is returned
//! trimmed with no tone. The function is total and has no side effects.

use serde::Serialize;

use crate::core::filter::Tone;

/// Maximum stem length, in characters, for a toned term.
pub const MAX_STEM_CHARS: usize = 12;

/// Normalized phonetic term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhoneticTerm {
    /// Stem without the trailing tone digit.
    pub stem: String,
    /// Trailing tone, when present.
    pub tone: Option<Tone>,
}

/// Splits a raw phonetic term into its stem and optional tone.
///
/// `normalize("wo3")` yields stem `wo` with tone 3; `normalize("wo")` and
/// `normalize("wo7")` yield the input with no tone.
#[must_use]
pub fn normalize(input: &str) -> PhoneticTerm {
    let trimmed = input.trim();
    match split_tone(trimmed) {
        Some((stem, tone)) => PhoneticTerm {
            stem: stem.to_string(),
            tone: Some(tone),
        },
        None => PhoneticTerm {
            stem: trimmed.to_string(),
            tone: None,
        },
    }
}

/// Returns the stem and tone when the term carries exactly one trailing tone digit.
fn split_tone(term: &str) -> Option<(&str, Tone)> {
    let mut chars = term.chars();
    let tone = Tone::from_digit(chars.next_back()?)?;
    let stem = chars.as_str();
    let stem_len = stem.chars().count();
    if stem_len == 0 || stem_len > MAX_STEM_CHARS {
        return None;
    }
    if stem.chars().any(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some((stem, tone))
}
