// crates/hanzi-ref-core/src/runtime/snapshot.rs
// ============================================================================
// Module: Cache Snapshot Persistence
// Description: Versioned on-disk encoding of the response cache.
// Purpose: Carry warmed cache entries across process restarts.
// Dependencies: crate::{core, runtime::cache}, serde, serde_json, tempfile, thiserror
// ============================================================================

//! ## Overview
//! A snapshot is a JSON document restricted to `{key -> result set}`:
//!
//! ```text
//! { "format": "hanzi-ref-cache-snapshot", "version": 1,
//!   "hash_algorithm": "sha256", "entries_hash": "<hex>",
//!   "entries": [ { "system": "pinyin", "key": "wo3", "records": [...] } ] }
//! ```
//!
//! Entries are sorted by key so identical caches produce identical files.
//! `entries_hash` covers the serialized `entries` array; any mismatch is
//! reported as corruption. Saves write a sibling temporary file and rename it
//! over the target so a crash never leaves a half-written snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::core::PhoneticSystem;
use crate::core::ResultSet;
use crate::core::hashing::DEFAULT_HASH_ALGORITHM;
use crate::core::hashing::HashAlgorithm;
use crate::core::hashing::hash_bytes;
use crate::runtime::cache::CacheKey;
use crate::runtime::cache::ResponseCache;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Format marker written into every snapshot.
pub const SNAPSHOT_FORMAT: &str = "hanzi-ref-cache-snapshot";
/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;
/// Maximum snapshot size accepted on load and produced on save.
pub const MAX_SNAPSHOT_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Snapshot load/save errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// No snapshot exists at the path.
    #[error("cache snapshot not found: {0}")]
    Missing(String),
    /// Filesystem failure.
    #[error("cache snapshot io error: {0}")]
    Io(String),
    /// Snapshot exceeds [`MAX_SNAPSHOT_BYTES`].
    #[error("cache snapshot too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual size in bytes.
        actual_bytes: usize,
    },
    /// Snapshot is malformed or fails its integrity check.
    #[error("cache snapshot corrupt: {0}")]
    Corrupt(String),
    /// Snapshot was written by an unsupported format version.
    #[error("cache snapshot version mismatch: {0}")]
    VersionMismatch(String),
}

// ============================================================================
// SECTION: Wire Types
// ============================================================================

/// One cached key and its result set.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    /// Transcription system of the key.
    system: PhoneticSystem,
    /// Normalized key text.
    key: String,
    /// Cached records.
    records: ResultSet,
}

/// Leading fields checked before decoding entries.
#[derive(Debug, Deserialize)]
struct SnapshotHeader {
    /// Format marker.
    format: String,
    /// Format version.
    version: u32,
}

/// Complete snapshot document.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    /// Format marker.
    format: String,
    /// Format version.
    version: u32,
    /// Algorithm used for `entries_hash`.
    hash_algorithm: HashAlgorithm,
    /// Hex digest of the serialized entries.
    entries_hash: String,
    /// Cache entries sorted by key.
    entries: Vec<SnapshotEntry>,
}

// ============================================================================
// SECTION: Save
// ============================================================================

/// Writes the cache to `path`, replacing any existing snapshot.
///
/// Returns the number of entries written.
///
/// # Errors
///
/// Returns [`SnapshotError`] when encoding or writing fails.
pub fn save_snapshot(path: &Path, cache: &ResponseCache) -> Result<usize, SnapshotError> {
    let entries: Vec<SnapshotEntry> = cache
        .to_sorted_map()
        .into_iter()
        .map(|(key, records)| SnapshotEntry {
            system: key.system,
            key: key.text,
            records,
        })
        .collect();
    let entries_bytes =
        serde_json::to_vec(&entries).map_err(|err| SnapshotError::Corrupt(err.to_string()))?;
    let digest = hash_bytes(DEFAULT_HASH_ALGORITHM, &entries_bytes);
    let count = entries.len();
    let file = SnapshotFile {
        format: SNAPSHOT_FORMAT.to_string(),
        version: SNAPSHOT_VERSION,
        hash_algorithm: digest.algorithm,
        entries_hash: digest.value,
        entries,
    };
    let bytes = serde_json::to_vec(&file).map_err(|err| SnapshotError::Corrupt(err.to_string()))?;
    if bytes.len() > MAX_SNAPSHOT_BYTES {
        return Err(SnapshotError::TooLarge {
            max_bytes: MAX_SNAPSHOT_BYTES,
            actual_bytes: bytes.len(),
        });
    }
    write_atomic(path, &bytes)?;
    Ok(count)
}

/// Writes bytes to a sibling temp file and renames it over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| SnapshotError::Io(err.to_string()))?;
    let mut temp =
        NamedTempFile::new_in(parent).map_err(|err| SnapshotError::Io(err.to_string()))?;
    temp.write_all(bytes).map_err(|err| SnapshotError::Io(err.to_string()))?;
    temp.as_file().sync_all().map_err(|err| SnapshotError::Io(err.to_string()))?;
    temp.persist(path).map_err(|err| SnapshotError::Io(err.error.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: Load
// ============================================================================

/// Reads a snapshot from `path` into a fresh cache.
///
/// # Errors
///
/// Returns [`SnapshotError`] when the file is missing, oversized, from another
/// format version, or fails decoding or its integrity check.
pub fn load_snapshot(path: &Path) -> Result<ResponseCache, SnapshotError> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(SnapshotError::Missing(path.display().to_string()));
        }
        Err(err) => return Err(SnapshotError::Io(err.to_string())),
    };
    let size = usize::try_from(metadata.len()).unwrap_or(usize::MAX);
    if size > MAX_SNAPSHOT_BYTES {
        return Err(SnapshotError::TooLarge {
            max_bytes: MAX_SNAPSHOT_BYTES,
            actual_bytes: size,
        });
    }
    let bytes = fs::read(path).map_err(|err| SnapshotError::Io(err.to_string()))?;
    decode_snapshot(&bytes)
}

/// Decodes and verifies snapshot bytes.
fn decode_snapshot(bytes: &[u8]) -> Result<ResponseCache, SnapshotError> {
    let header: SnapshotHeader =
        serde_json::from_slice(bytes).map_err(|err| SnapshotError::Corrupt(err.to_string()))?;
    if header.format != SNAPSHOT_FORMAT {
        return Err(SnapshotError::Corrupt(format!("unexpected format marker: {}", header.format)));
    }
    if header.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionMismatch(format!(
            "unsupported snapshot version: {} (expected {SNAPSHOT_VERSION})",
            header.version
        )));
    }
    let file: SnapshotFile =
        serde_json::from_slice(bytes).map_err(|err| SnapshotError::Corrupt(err.to_string()))?;
    let entries_bytes =
        serde_json::to_vec(&file.entries).map_err(|err| SnapshotError::Corrupt(err.to_string()))?;
    let expected = hash_bytes(file.hash_algorithm, &entries_bytes);
    if expected.value != file.entries_hash {
        return Err(SnapshotError::Corrupt("entries hash mismatch".to_string()));
    }
    let mut cache = ResponseCache::new();
    for entry in file.entries {
        if entry.key.is_empty() {
            return Err(SnapshotError::Corrupt("snapshot entry with empty key".to_string()));
        }
        if entry.records.is_empty() {
            return Err(SnapshotError::Corrupt(format!(
                "snapshot entry {}:{} has no records",
                entry.system, entry.key
            )));
        }
        let key = CacheKey {
            system: entry.system,
            text: entry.key,
        };
        cache.put(key, entry.records);
    }
    Ok(cache)
}
