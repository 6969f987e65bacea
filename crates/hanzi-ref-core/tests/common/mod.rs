// crates/hanzi-ref-core/tests/common/mod.rs
// ============================================================================
// Module: Reference Store Test Helpers
// Description: Sample records and instrumented backends for core tests.
// Purpose: Share fixtures across the hanzi-ref-core integration suites.
// ============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use hanzi_ref_core::BackendError;
use hanzi_ref_core::CacheSettings;
use hanzi_ref_core::CharacterBackend;
use hanzi_ref_core::CharacterRecord;
use hanzi_ref_core::InMemoryCharacterBackend;
use hanzi_ref_core::LookupFilter;
use hanzi_ref_core::QueryRows;
use hanzi_ref_core::ReferenceStoreConfig;
use hanzi_ref_core::Tone;

// ============================================================================
// SECTION: Records
// ============================================================================

/// Builds a record with the given fields.
pub fn record(
    id: i64,
    character: &str,
    zhuyin: &str,
    pinyin: &str,
    tone: u8,
    definition: &str,
    freq: i64,
) -> CharacterRecord {
    CharacterRecord {
        id,
        character: character.to_string(),
        zhuyin: zhuyin.to_string(),
        pinyin: pinyin.to_string(),
        tone: Tone::new(tone),
        definition: definition.to_string(),
        freq,
    }
}

/// Small dictionary with overlapping readings.
pub fn sample_records() -> Vec<CharacterRecord> {
    vec![
        record(1, "我", "ㄨㄛ", "wo", 3, "I; me; my", 900),
        record(2, "窝", "ㄨㄛ", "wo", 1, "nest; den", 300),
        record(3, "握", "ㄨㄛ", "wo", 4, "to hold; to grasp", 400),
        record(4, "你", "ㄋㄧ", "ni", 3, "you", 950),
        record(5, "泥", "ㄋㄧ", "ni", 2, "mud; clay", 200),
        record(6, "好", "ㄏㄠ", "hao", 3, "good; well", 800),
    ]
}

/// Store configuration with the cache enabled and no snapshot.
pub fn cached_config() -> ReferenceStoreConfig {
    ReferenceStoreConfig::default()
}

/// Store configuration with the cache disabled.
pub fn uncached_config() -> ReferenceStoreConfig {
    ReferenceStoreConfig {
        cache: CacheSettings {
            enabled: false,
            snapshot_path: None,
        },
        ..ReferenceStoreConfig::default()
    }
}

/// Spins until `condition` holds, panicking after five seconds.
pub fn wait_for(description: &str, condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "timed out waiting for {description}");
        thread::sleep(Duration::from_millis(1));
    }
}

// ============================================================================
// SECTION: Backends
// ============================================================================

/// In-memory backend that counts and records every query.
pub struct CountingBackend {
    inner: InMemoryCharacterBackend,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<LookupFilter>>>,
}

/// Observation handles for a [`CountingBackend`].
#[derive(Clone)]
pub struct QueryLog {
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<LookupFilter>>>,
}

impl QueryLog {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<LookupFilter> {
        self.seen.lock().unwrap().clone()
    }
}

impl CountingBackend {
    pub fn new(records: Vec<CharacterRecord>) -> (Self, QueryLog) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = QueryLog {
            calls: Arc::clone(&calls),
            seen: Arc::clone(&seen),
        };
        (
            Self {
                inner: InMemoryCharacterBackend::new(records),
                calls,
                seen,
            },
            log,
        )
    }
}

impl CharacterBackend for CountingBackend {
    fn query(&mut self, filter: &LookupFilter, limit: usize) -> Result<QueryRows, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(filter.clone());
        self.inner.query(filter, limit)
    }
}

/// Backend that parks every query until the test releases it.
///
/// Each query signals `entered` and then waits for one release token.
/// Dropping the release sender lets every later query run freely.
pub struct GatedBackend {
    inner: CountingBackend,
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

/// Test side of a [`GatedBackend`].
pub struct Gate {
    pub entered: mpsc::Receiver<()>,
    pub release: mpsc::Sender<()>,
    pub log: QueryLog,
}

impl GatedBackend {
    pub fn new(records: Vec<CharacterRecord>) -> (Self, Gate) {
        let (inner, log) = CountingBackend::new(records);
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        (
            Self {
                inner,
                entered: entered_tx,
                release: release_rx,
            },
            Gate {
                entered: entered_rx,
                release: release_tx,
                log,
            },
        )
    }
}

impl CharacterBackend for GatedBackend {
    fn query(&mut self, filter: &LookupFilter, limit: usize) -> Result<QueryRows, BackendError> {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        self.inner.query(filter, limit)
    }
}

/// Backend driven by a closure.
pub struct ScriptedBackend<F> {
    script: F,
}

impl<F> ScriptedBackend<F>
where
    F: FnMut(&LookupFilter) -> Result<QueryRows, BackendError> + Send,
{
    pub const fn new(script: F) -> Self {
        Self {
            script,
        }
    }
}

impl<F> CharacterBackend for ScriptedBackend<F>
where
    F: FnMut(&LookupFilter) -> Result<QueryRows, BackendError> + Send,
{
    fn query(&mut self, filter: &LookupFilter, _limit: usize) -> Result<QueryRows, BackendError> {
        (self.script)(filter)
    }
}
