// crates/hanzi-ref-core/src/runtime/cache.rs
// ============================================================================
// Module: Response Cache
// Description: Worker-owned map from normalized phonetic keys to result sets.
// Purpose: Short-circuit repeated phonetic lookups without touching storage.
// Dependencies: crate::core, serde, tracing
// ============================================================================

//! ## Overview
//! The cache is owned by the router thread and is never shared behind a lock.
//! Keys are derived from the first record of a non-empty backend result, one
//! per non-empty transcription, so a miss under pinyin also warms the zhuyin
//! key for the same reading. Entries are write-once and never evicted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::core::LookupFilter;
use crate::core::PhoneticSystem;
use crate::core::ResultSet;
use crate::core::Tone;

// ============================================================================
// SECTION: Cache Key
// ============================================================================

/// Normalized phonetic identity: system plus `lowercase(stem) ++ tone digit`.
///
/// # Invariants
/// - `text` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Transcription system the stem belongs to.
    pub system: PhoneticSystem,
    /// Stem followed by the tone digit (or nothing when the tone is unknown).
    pub text: String,
}

impl CacheKey {
    /// Derives a key, returning `None` for an empty stem.
    #[must_use]
    pub fn new(system: PhoneticSystem, stem: &str, tone: Option<Tone>) -> Option<Self> {
        let stem = stem.trim();
        if stem.is_empty() {
            return None;
        }
        let mut text = stem.to_ascii_lowercase();
        if let Some(tone) = tone {
            text.push_str(&tone.to_string());
        }
        Some(Self {
            system,
            text,
        })
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.system, self.text)
    }
}

// ============================================================================
// SECTION: Response Cache
// ============================================================================

/// Unbounded, write-once cache of lookup results.
#[derive(Debug, Clone, Default)]
pub struct ResponseCache {
    /// Cached result sets by key.
    entries: HashMap<CacheKey, ResultSet>,
}

impl ResponseCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when the cache holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the result set stored under `key`.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<ResultSet> {
        self.entries.get(key).cloned()
    }

    /// Stores `results` under `key` unless the key is already present.
    ///
    /// Returns true when the entry was inserted.
    pub fn put(&mut self, key: CacheKey, results: ResultSet) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(results);
                true
            }
        }
    }

    /// Checks the cache for a phonetic-only filter, zhuyin first.
    ///
    /// Filters that constrain character, definition, or id never hit, and
    /// empty stems never form a key.
    #[must_use]
    pub fn lookup(&self, filter: &LookupFilter) -> Option<(CacheKey, ResultSet)> {
        if !filter.is_phonetic_only() {
            return None;
        }
        PhoneticSystem::ALL.into_iter().find_map(|system| {
            let key = CacheKey::new(system, filter.phonetic(system)?, filter.tone)?;
            self.get(&key).map(|results| (key, results))
        })
    }

    /// Indexes a backend result under keys derived from its first record.
    ///
    /// Only results of phonetic-only lookups belong here; character and
    /// definition results need not share the first record's reading. Empty
    /// results are never cached. Returns the number of new keys.
    pub fn remember(&mut self, results: &ResultSet) -> usize {
        let Some(first) = results.first() else {
            return 0;
        };
        let mut inserted = 0;
        for system in PhoneticSystem::ALL {
            let Some(key) = CacheKey::new(system, first.phonetic(system), first.tone) else {
                continue;
            };
            debug!(key = %key, records = results.len(), "caching lookup result");
            if self.put(key, results.clone()) {
                inserted += 1;
            }
        }
        inserted
    }

    /// Returns a sorted copy of all entries.
    #[must_use]
    pub fn to_sorted_map(&self) -> BTreeMap<CacheKey, ResultSet> {
        self.entries.iter().map(|(key, value)| (key.clone(), value.clone())).collect()
    }
}

impl FromIterator<(CacheKey, ResultSet)> for ResponseCache {
    fn from_iter<I: IntoIterator<Item = (CacheKey, ResultSet)>>(iter: I) -> Self {
        let mut cache = Self::new();
        for (key, results) in iter {
            cache.put(key, results);
        }
        cache
    }
}
