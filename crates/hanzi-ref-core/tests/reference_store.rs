// crates/hanzi-ref-core/tests/reference_store.rs
// ============================================================================
// Module: Reference Store Tests
// Description: Router ordering, caching, degradation, and shutdown behavior.
// Purpose: Validate the single-worker lookup pipeline end to end.
// ============================================================================

//! ## Overview
//! Exercises [`ReferenceStore`] over instrumented in-memory backends:
//! - FIFO service order across concurrent callers
//! - Cache hits that skip the backend, and cache keys derived from results
//! - Degraded replies on query failure and skipped-row accounting
//! - Drain-on-shutdown and rejection after close

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

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use hanzi_ref_core::BackendError;
use hanzi_ref_core::CacheKey;
use hanzi_ref_core::InMemoryCharacterBackend;
use hanzi_ref_core::LookupFilter;
use hanzi_ref_core::LookupSource;
use hanzi_ref_core::MAX_RESULTS;
use hanzi_ref_core::PhoneticSystem;
use hanzi_ref_core::QueryRows;
use hanzi_ref_core::ReferenceStore;
use hanzi_ref_core::ReferenceStoreConfig;
use hanzi_ref_core::RouterState;
use hanzi_ref_core::StoreError;
use hanzi_ref_core::Tone;

use crate::common::CountingBackend;
use crate::common::GatedBackend;
use crate::common::ScriptedBackend;
use crate::common::cached_config;
use crate::common::record;
use crate::common::sample_records;
use crate::common::uncached_config;
use crate::common::wait_for;

fn characters(results: &hanzi_ref_core::ResultSet) -> Vec<&str> {
    results.iter().map(|record| record.character.as_str()).collect()
}

// ============================================================================
// SECTION: Lookups
// ============================================================================

#[test]
fn lookups_return_frequency_ordered_results() {
    let store =
        ReferenceStore::open(InMemoryCharacterBackend::new(sample_records()), cached_config())
            .unwrap();

    let (results, count) = store.get_by_pinyin("wo").unwrap();
    assert_eq!(count, 3);
    assert_eq!(characters(&results), vec!["我", "握", "窝"]);

    let (results, count) = store.get_by_definition("MUD").unwrap();
    assert_eq!(count, 1);
    assert_eq!(characters(&results), vec!["泥"]);

    let (results, _) = store.get_by_character("好").unwrap();
    assert_eq!(results.first().unwrap().id, 6);

    store.shutdown().unwrap();
}

#[test]
fn toned_phonetic_lookup_filters_by_tone() {
    let store =
        ReferenceStore::open(InMemoryCharacterBackend::new(sample_records()), cached_config())
            .unwrap();

    let (results, count) = store.get_by_zhuyin("ㄨㄛ4").unwrap();
    assert_eq!(count, 1);
    assert_eq!(characters(&results), vec!["握"]);

    let (results, _) = store.get_by_pinyin("ni2").unwrap();
    assert_eq!(characters(&results), vec!["泥"]);

    store.shutdown().unwrap();
}

#[test]
fn results_are_capped() {
    let records = (1 ..= 80)
        .map(|id| record(id, "字", "ㄗ", "zi", 4, "character", 1000 - id))
        .collect();
    let store =
        ReferenceStore::open(InMemoryCharacterBackend::new(records), uncached_config()).unwrap();

    let (results, count) = store.get_by_pinyin("zi").unwrap();
    assert_eq!(count, MAX_RESULTS);
    assert_eq!(results.first().unwrap().id, 1);
    assert_eq!(results.records().last().unwrap().id, 50);

    store.shutdown().unwrap();
}

#[test]
fn unmatched_lookup_returns_empty_set() {
    let store =
        ReferenceStore::open(InMemoryCharacterBackend::new(sample_records()), cached_config())
            .unwrap();
    let (results, count) = store.get_by_definition("zebra").unwrap();
    assert!(results.is_empty());
    assert_eq!(count, 0);
    store.shutdown().unwrap();
}

// ============================================================================
// SECTION: Cache
// ============================================================================

#[test]
fn repeated_phonetic_lookup_is_served_from_cache() {
    let (backend, log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    let first = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "wo3")).unwrap();
    assert_eq!(first.source, LookupSource::Backend);
    assert_eq!(log.calls(), 1);

    let second = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "WO3")).unwrap();
    assert_eq!(second.source, LookupSource::Cache);
    assert_eq!(second.results, first.results);
    assert!(second.results.shares_storage_with(&first.results));
    assert_eq!(log.calls(), 1);

    let stats = store.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
    store.shutdown().unwrap();
}

#[test]
fn miss_warms_both_transcription_keys() {
    let (backend, log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    store.get_by_pinyin("ni3").unwrap();
    let lookup = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Zhuyin, "ㄋㄧ3")).unwrap();
    assert_eq!(lookup.source, LookupSource::Cache);
    assert_eq!(log.calls(), 1);

    let keys: Vec<CacheKey> = store.cache_entries().unwrap().into_keys().collect();
    assert_eq!(
        keys,
        vec![
            CacheKey::new(PhoneticSystem::Zhuyin, "ㄋㄧ", Tone::new(3)).unwrap(),
            CacheKey::new(PhoneticSystem::Pinyin, "ni", Tone::new(3)).unwrap(),
        ]
    );
    store.shutdown().unwrap();
}

#[test]
fn cache_keys_derive_from_first_result_record() {
    let (backend, log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    let untoned = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "wo")).unwrap();
    assert_eq!(untoned.results.len(), 3);

    let toned = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "wo3")).unwrap();
    assert_eq!(toned.source, LookupSource::Cache);
    assert_eq!(toned.results, untoned.results);

    let again = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "wo")).unwrap();
    assert_eq!(again.source, LookupSource::Backend);
    assert_eq!(log.calls(), 2);
    store.shutdown().unwrap();
}

#[test]
fn cache_entries_are_write_once() {
    let (backend, log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    let broad = store.get_by_phonetic(PhoneticSystem::Pinyin, "wo").unwrap().0;
    let wider = store.get_by_phonetic(PhoneticSystem::Pinyin, "o").unwrap().0;
    assert_eq!(characters(&wider), vec!["我", "好", "握", "窝"]);
    assert_eq!(log.calls(), 2);

    let entries = store.cache_entries().unwrap();
    let key = CacheKey::new(PhoneticSystem::Pinyin, "wo", Tone::new(3)).unwrap();
    assert_eq!(entries.get(&key), Some(&broad));
    assert_eq!(entries.len(), 2);
    store.shutdown().unwrap();
}

#[test]
fn character_and_definition_results_are_not_cached() {
    let mut backend = InMemoryCharacterBackend::default();
    for entry in sample_records() {
        backend.insert(entry);
    }
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    let (by_definition, _) = store.get_by_definition("o").unwrap();
    assert!(by_definition.len() > 1);
    store.get_by_character("好").unwrap();
    assert!(store.cache_entries().unwrap().is_empty());

    let lookup = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "ni3")).unwrap();
    assert_eq!(lookup.source, LookupSource::Backend);
    assert_eq!(characters(&lookup.results), vec!["你"]);
    assert!(
        lookup
            .results
            .iter()
            .all(|entry| entry.pinyin == "ni" && entry.tone == Tone::new(3))
    );

    let again = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "ni3")).unwrap();
    assert_eq!(again.source, LookupSource::Cache);
    assert_eq!(again.results, lookup.results);
    store.shutdown().unwrap();
}

#[test]
fn non_phonetic_lookups_bypass_cache() {
    let (backend, log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    store.get_by_pinyin("hao3").unwrap();
    assert_eq!(log.calls(), 1);

    store.get_by_character("好").unwrap();
    store.get_by_character("好").unwrap();
    store.get_by_definition("good").unwrap();
    assert_eq!(log.calls(), 4);

    let mixed = LookupFilter {
        definition: Some("good".to_string()),
        ..LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "hao3")
    };
    let lookup = store.lookup(mixed).unwrap();
    assert_eq!(lookup.source, LookupSource::Backend);
    assert_eq!(log.calls(), 5);
    store.shutdown().unwrap();
}

#[test]
fn empty_results_are_never_cached() {
    let (backend, log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    store.get_by_pinyin("zzz4").unwrap();
    store.get_by_pinyin("zzz4").unwrap();
    assert_eq!(log.calls(), 2);
    assert!(store.cache_entries().unwrap().is_empty());
    store.shutdown().unwrap();
}

#[test]
fn empty_phonetic_term_never_hits_cache() {
    let records = vec![record(9, "〇", "", "", 0, "zero", 10)];
    let (backend, log) = CountingBackend::new(records);
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    let first = store.get_by_character("〇").unwrap();
    assert_eq!(first.1, 1);
    assert!(store.cache_entries().unwrap().is_empty());

    let lookup = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "")).unwrap();
    assert_eq!(lookup.source, LookupSource::Backend);
    assert_eq!(log.calls(), 2);
    store.shutdown().unwrap();
}

#[test]
fn disabled_cache_always_queries_backend() {
    let (backend, log) = CountingBackend::new(sample_records());
    let store = ReferenceStore::open(backend, uncached_config()).unwrap();

    store.get_by_pinyin("wo3").unwrap();
    let lookup = store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "wo3")).unwrap();
    assert_eq!(lookup.source, LookupSource::Backend);
    assert_eq!(log.calls(), 2);
    assert!(store.cache_entries().unwrap().is_empty());
    store.shutdown().unwrap();
}

// ============================================================================
// SECTION: Failures
// ============================================================================

#[test]
fn query_failure_degrades_to_empty_result() {
    let mut fail_next = true;
    let backend = ScriptedBackend::new(move |_filter: &LookupFilter| {
        if std::mem::replace(&mut fail_next, false) {
            return Err(BackendError::QueryFailed("disk I/O error".to_string()));
        }
        Ok(QueryRows {
            records: vec![record(1, "我", "ㄨㄛ", "wo", 3, "I; me", 900)],
            skipped: Vec::new(),
        })
    });
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    let degraded = store.lookup(LookupFilter::by_character("我")).unwrap();
    assert_eq!(degraded.source, LookupSource::Degraded);
    assert!(degraded.results.is_empty());
    assert_eq!(
        degraded.failure,
        Some(BackendError::QueryFailed("disk I/O error".to_string()))
    );

    let recovered = store.lookup(LookupFilter::by_character("我")).unwrap();
    assert_eq!(recovered.source, LookupSource::Backend);
    assert_eq!(recovered.results.len(), 1);
    assert_eq!(store.stats().query_failures, 1);
    store.shutdown().unwrap();
}

#[test]
fn skipped_rows_are_reported() {
    let backend = ScriptedBackend::new(|_filter: &LookupFilter| {
        Ok(QueryRows {
            records: vec![record(1, "我", "ㄨㄛ", "wo", 3, "I; me", 900)],
            skipped: vec![BackendError::DecodeFailed {
                row_id: Some(2),
                message: "tone out of range: 9 (expected 0-6)".to_string(),
            }],
        })
    });
    let store = ReferenceStore::open(backend, cached_config()).unwrap();

    let lookup = store.lookup(LookupFilter::by_definition("me")).unwrap();
    assert_eq!(lookup.source, LookupSource::Backend);
    assert_eq!(lookup.results.len(), 1);
    assert_eq!(lookup.skipped_rows, 1);
    assert_eq!(store.stats().skipped_rows, 1);
    store.shutdown().unwrap();
}

#[test]
fn reply_timeout_reports_timeout() {
    let (backend, gate) = GatedBackend::new(sample_records());
    let config = ReferenceStoreConfig {
        reply_timeout: Some(Duration::from_millis(50)),
        ..uncached_config()
    };
    let store = ReferenceStore::open(backend, config).unwrap();

    let err = store.get_by_pinyin("wo").unwrap_err();
    assert_eq!(
        err,
        StoreError::Timeout {
            waited_ms: 50
        }
    );

    drop(gate.release);
    let report = store.shutdown().unwrap();
    assert_eq!(report.processed, 1);
}

#[test]
fn invalid_config_is_rejected() {
    let config = ReferenceStoreConfig {
        queue_capacity: 0,
        ..ReferenceStoreConfig::default()
    };
    let err = ReferenceStore::open(InMemoryCharacterBackend::default(), config).err().unwrap();
    assert!(matches!(err, StoreError::Invalid(_)));
}

// ============================================================================
// SECTION: Ordering
// ============================================================================

#[test]
fn requests_are_served_in_submission_order() {
    let (backend, gate) = GatedBackend::new(sample_records());
    let store = ReferenceStore::open(backend, uncached_config()).unwrap();

    let first_store = store.clone();
    let first = thread::spawn(move || first_store.lookup(LookupFilter::by_character("我")));
    gate.entered.recv().unwrap();

    let second_store = store.clone();
    let second = thread::spawn(move || second_store.lookup(LookupFilter::by_definition("you")));
    wait_for("second request to enqueue", || store.stats().enqueued == 2);

    let third_store = store.clone();
    let third = thread::spawn(move || {
        third_store.lookup(LookupFilter::by_phonetic(PhoneticSystem::Pinyin, "hao3"))
    });
    wait_for("third request to enqueue", || store.stats().enqueued == 3);
    assert_eq!(store.stats().pending, 3);

    drop(gate.release);
    let first = first.join().unwrap().unwrap();
    let second = second.join().unwrap().unwrap();
    let third = third.join().unwrap().unwrap();

    assert_eq!(first.served_sequence, 1);
    assert_eq!(second.served_sequence, 2);
    assert_eq!(third.served_sequence, 3);
    assert_eq!(characters(&first.results), vec!["我"]);
    assert_eq!(characters(&second.results), vec!["你"]);
    assert_eq!(characters(&third.results), vec!["好"]);

    let seen = gate.log.seen();
    assert_eq!(seen[0].character.as_deref(), Some("我"));
    assert_eq!(seen[1].definition.as_deref(), Some("you"));
    assert_eq!(seen[2].pinyin.as_deref(), Some("hao"));
    store.shutdown().unwrap();
}

#[test]
fn concurrent_callers_each_get_their_own_reply() {
    let store =
        ReferenceStore::open(InMemoryCharacterBackend::new(sample_records()), cached_config())
            .unwrap();
    let terms = ["我", "窝", "握", "你", "泥", "好"];

    let handles: Vec<_> = (0 .. 8)
        .map(|worker| {
            let store = store.clone();
            thread::spawn(move || {
                let mut sequences = Vec::new();
                for round in 0 .. 20 {
                    let term = terms[(worker + round) % terms.len()];
                    let lookup = store.lookup(LookupFilter::by_character(term)).unwrap();
                    assert_eq!(characters(&lookup.results), vec![term]);
                    sequences.push(lookup.served_sequence);
                }
                sequences
            })
        })
        .collect();

    let mut all = BTreeSet::new();
    for handle in handles {
        for sequence in handle.join().unwrap() {
            assert!(all.insert(sequence), "sequence {sequence} served twice");
        }
    }
    assert_eq!(all.len(), 160);
    assert_eq!(all.first(), Some(&1));
    assert_eq!(all.last(), Some(&160));

    let report = store.shutdown().unwrap();
    assert_eq!(report.processed, 160);
}

// ============================================================================
// SECTION: Shutdown
// ============================================================================

#[test]
fn shutdown_drains_queued_requests() {
    let (backend, gate) = GatedBackend::new(sample_records());
    let store = ReferenceStore::open(backend, uncached_config()).unwrap();

    let in_flight_store = store.clone();
    let in_flight = thread::spawn(move || in_flight_store.get_by_pinyin("wo"));
    gate.entered.recv().unwrap();

    let queued_store = store.clone();
    let queued = thread::spawn(move || queued_store.get_by_definition("mud"));
    wait_for("queued request", || store.stats().enqueued == 2);

    let closing_store = store.clone();
    let closing = thread::spawn(move || closing_store.shutdown());
    wait_for("draining state", || store.state() == RouterState::Draining);

    assert_eq!(store.get_by_pinyin("ni").unwrap_err(), StoreError::StoreClosed);

    drop(gate.release);
    let report = closing.join().unwrap().unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.snapshot_entries, None);
    assert_eq!(in_flight.join().unwrap().unwrap().1, 3);
    assert_eq!(queued.join().unwrap().unwrap().1, 1);
    assert_eq!(store.state(), RouterState::Closed);
    assert_eq!(store.stats().rejected, 1);
}

#[test]
fn closed_store_rejects_everything() {
    let store =
        ReferenceStore::open(InMemoryCharacterBackend::new(sample_records()), cached_config())
            .unwrap();
    store.get_by_pinyin("wo3").unwrap();
    let report = store.shutdown().unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.cache_entries, 2);

    assert_eq!(store.get_by_character("我").unwrap_err(), StoreError::StoreClosed);
    assert_eq!(store.cache_entries().unwrap_err(), StoreError::StoreClosed);
    assert_eq!(store.shutdown().unwrap_err(), StoreError::StoreClosed);
    assert_eq!(store.stats().pending, 0);
}
