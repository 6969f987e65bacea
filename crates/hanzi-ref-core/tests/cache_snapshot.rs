// crates/hanzi-ref-core/tests/cache_snapshot.rs
// ============================================================================
// Module: Cache Snapshot Tests
// Description: Persistence of the response cache across store restarts.
// Purpose: Validate round trips, integrity checks, and best-effort loading.
// ============================================================================

//! ## Overview
//! - Shutdown writes the snapshot; the next open serves from it
//! - Missing, corrupt, tampered, and foreign-version files are rejected on
//!   load and ignored by the store
//! - Save failures surface after the store has closed

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::fs;
use std::path::Path;

use hanzi_ref_core::CacheKey;
use hanzi_ref_core::CacheSettings;
use hanzi_ref_core::LookupFilter;
use hanzi_ref_core::LookupSource;
use hanzi_ref_core::PhoneticSystem;
use hanzi_ref_core::ReferenceStore;
use hanzi_ref_core::ReferenceStoreConfig;
use hanzi_ref_core::ResponseCache;
use hanzi_ref_core::ResultSet;
use hanzi_ref_core::RouterState;
use hanzi_ref_core::SNAPSHOT_VERSION;
use hanzi_ref_core::SnapshotError;
use hanzi_ref_core::StoreError;
use hanzi_ref_core::Tone;
use hanzi_ref_core::load_snapshot;
use hanzi_ref_core::save_snapshot;
use serde_json::Value;
use tempfile::TempDir;

use crate::common::CountingBackend;
use crate::common::record;
use crate::common::sample_records;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn snapshot_config(path: &Path) -> ReferenceStoreConfig {
    ReferenceStoreConfig {
        cache: CacheSettings {
            enabled: true,
            snapshot_path: Some(path.to_path_buf()),
        },
        ..ReferenceStoreConfig::default()
    }
}

fn warm_cache() -> ResponseCache {
    let mut cache = ResponseCache::new();
    cache.remember(&ResultSet::from_records(vec![
        record(1, "我", "ㄨㄛ", "wo", 3, "I; me; my", 900),
        record(3, "握", "ㄨㄛ", "wo", 4, "to hold; to grasp", 400),
    ]));
    cache.remember(&ResultSet::from_records(vec![record(6, "好", "ㄏㄠ", "hao", 3, "good", 800)]));
    cache
}

// ============================================================================
// SECTION: Round Trip
// ============================================================================

#[test]
fn snapshot_round_trip_preserves_entries() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    let cache = warm_cache();

    let written = save_snapshot(&path, &cache).unwrap();
    assert_eq!(written, 4);

    let loaded = load_snapshot(&path).unwrap();
    assert_eq!(loaded.to_sorted_map(), cache.to_sorted_map());
}

#[test]
fn identical_caches_produce_identical_files() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("first.json");
    let second = dir.path().join("second.json");
    save_snapshot(&first, &warm_cache()).unwrap();
    save_snapshot(&second, &warm_cache()).unwrap();
    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}

#[test]
fn restarted_store_serves_from_snapshot() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("cache.json");

    let (backend, _log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, snapshot_config(&path)).unwrap();
    store.get_by_pinyin("wo3").unwrap();
    let before = store.cache_entries().unwrap();
    let report = store.shutdown().unwrap();
    assert_eq!(report.snapshot_entries, Some(2));
    assert!(path.exists());

    let (backend, log) = CountingBackend::new(sample_records());
    let restarted = ReferenceStore::open(backend, snapshot_config(&path)).unwrap();
    assert_eq!(restarted.cache_entries().unwrap(), before);
    let lookup =
        restarted.lookup(LookupFilter::by_phonetic(PhoneticSystem::Zhuyin, "ㄨㄛ3")).unwrap();
    assert_eq!(lookup.source, LookupSource::Cache);
    assert_eq!(lookup.results.first().unwrap().character, "我");
    assert_eq!(log.calls(), 0);
    restarted.shutdown().unwrap();
}

#[test]
fn disabled_cache_neither_loads_nor_saves() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    save_snapshot(&path, &warm_cache()).unwrap();
    let original = fs::read(&path).unwrap();

    let mut config = snapshot_config(&path);
    config.cache.enabled = false;
    let (backend, log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, config).unwrap();
    assert!(store.cache_entries().unwrap().is_empty());
    store.get_by_pinyin("hao3").unwrap();
    assert_eq!(log.calls(), 1);

    let report = store.shutdown().unwrap();
    assert_eq!(report.snapshot_entries, None);
    assert_eq!(fs::read(&path).unwrap(), original);
}

// ============================================================================
// SECTION: Rejected Snapshots
// ============================================================================

#[test]
fn missing_snapshot_is_reported_and_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.json");
    assert!(matches!(load_snapshot(&path), Err(SnapshotError::Missing(_))));

    let (backend, _log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, snapshot_config(&path)).unwrap();
    assert!(store.cache_entries().unwrap().is_empty());
    store.shutdown().unwrap();
}

#[test]
fn corrupt_snapshot_is_ignored_at_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    fs::write(&path, b"\x00\x01not json").unwrap();
    assert!(matches!(load_snapshot(&path), Err(SnapshotError::Corrupt(_))));

    let (backend, log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, snapshot_config(&path)).unwrap();
    assert!(store.cache_entries().unwrap().is_empty());
    let (results, _) = store.get_by_pinyin("ni3").unwrap();
    assert_eq!(results.first().unwrap().character, "你");
    assert_eq!(log.calls(), 1);

    let report = store.shutdown().unwrap();
    assert_eq!(report.snapshot_entries, Some(2));
    assert_eq!(load_snapshot(&path).unwrap().len(), 2);
}

#[test]
fn tampered_entries_fail_integrity_check() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    save_snapshot(&path, &warm_cache()).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let tampered = text.replace("to grasp", "to throw");
    assert_ne!(text, tampered);
    fs::write(&path, tampered).unwrap();

    let err = load_snapshot(&path).err().unwrap();
    assert_eq!(err, SnapshotError::Corrupt("entries hash mismatch".to_string()));
}

#[test]
fn foreign_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    save_snapshot(&path, &warm_cache()).unwrap();

    let mut document: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    document["version"] = Value::from(SNAPSHOT_VERSION + 1);
    fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

    assert!(matches!(load_snapshot(&path), Err(SnapshotError::VersionMismatch(_))));
}

#[test]
fn wrong_format_marker_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    save_snapshot(&path, &warm_cache()).unwrap();

    let mut document: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    document["format"] = Value::from("something-else");
    fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

    assert!(matches!(load_snapshot(&path), Err(SnapshotError::Corrupt(_))));
}

#[test]
fn out_of_range_tone_in_snapshot_is_corrupt() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("cache.json");
    save_snapshot(&path, &warm_cache()).unwrap();

    let mut document: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    document["entries"][0]["records"][0]["Tone"] = Value::from(9);
    fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

    assert!(matches!(load_snapshot(&path), Err(SnapshotError::Corrupt(_))));
}

// ============================================================================
// SECTION: Save Failures
// ============================================================================

#[test]
fn save_failure_is_reported_after_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("occupied");
    fs::create_dir(&path).unwrap();

    let (backend, _log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, snapshot_config(&path)).unwrap();
    store.get_by_pinyin("wo3").unwrap();

    let err = store.shutdown().unwrap_err();
    assert!(matches!(err, StoreError::CacheSaveFailed(_)));
    assert_eq!(store.state(), RouterState::Closed);
    assert_eq!(store.get_by_pinyin("wo3").unwrap_err(), StoreError::StoreClosed);
    assert!(path.is_dir());
}

#[test]
fn cache_key_text_folds_case_and_appends_tone() {
    let key = CacheKey::new(PhoneticSystem::Pinyin, " Wo ", Tone::new(3)).unwrap();
    assert_eq!(key.text, "wo3");
    assert_eq!(key.to_string(), "pinyin:wo3");
    assert!(CacheKey::new(PhoneticSystem::Zhuyin, "  ", Tone::new(1)).is_none());
}
