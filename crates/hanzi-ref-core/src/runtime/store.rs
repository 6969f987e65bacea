// crates/hanzi-ref-core/src/runtime/store.rs
// ============================================================================
// Module: Reference Store
// Description: Public lookup facade over the request router.
// Purpose: Open, query, and shut down the character reference store.
// Dependencies: crate::{core, interfaces, runtime}, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`ReferenceStore`] is a cheap-to-clone handle. Every clone submits to the
//! same router thread, so lookups from any number of caller threads are served
//! one at a time in submission order. [`ReferenceStore::shutdown`] closes
//! submissions, waits for queued lookups to drain, releases the backend, and
//! persists the cache snapshot when one is configured.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::core::LookupFilter;
use crate::core::LookupKind;
use crate::core::PhoneticSystem;
use crate::core::ResultSet;
use crate::interfaces::CharacterBackend;
use crate::runtime::cache::CacheKey;
use crate::runtime::cache::ResponseCache;
use crate::runtime::router::Lookup;
use crate::runtime::router::RouterCounters;
use crate::runtime::router::RouterGateway;
use crate::runtime::router::RouterState;
use crate::runtime::router::RouterStatsSnapshot;
use crate::runtime::router::spawn_router;
use crate::runtime::snapshot::SnapshotError;
use crate::runtime::snapshot::load_snapshot;
use crate::runtime::snapshot::save_snapshot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default request queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Reference store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The storage backend could not be opened.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    /// The cache snapshot could not be loaded; the store starts cold.
    #[error("cache snapshot load failed: {0}")]
    CacheLoadFailed(String),
    /// The cache snapshot could not be written at shutdown.
    #[error("cache snapshot save failed: {0}")]
    CacheSaveFailed(String),
    /// The store no longer accepts requests.
    #[error("reference store closed")]
    StoreClosed,
    /// The caller stopped waiting for a reply.
    #[error("lookup timed out after {waited_ms} ms")]
    Timeout {
        /// Time waited before giving up.
        waited_ms: u64,
    },
    /// The router thread failed.
    #[error("router worker failed: {0}")]
    WorkerFailed(String),
    /// Store configuration is invalid.
    #[error("invalid store configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    /// Consult and populate the cache. Disabled stores always query the backend.
    pub enabled: bool,
    /// Snapshot loaded at open and written at shutdown.
    pub snapshot_path: Option<PathBuf>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_path: None,
        }
    }
}

/// Reference store configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceStoreConfig {
    /// Cache settings.
    pub cache: CacheSettings,
    /// Maximum queued requests before submitters block.
    pub queue_capacity: usize,
    /// Maximum time a caller waits for its reply; `None` waits indefinitely.
    pub reply_timeout: Option<Duration>,
}

impl Default for ReferenceStoreConfig {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            reply_timeout: None,
        }
    }
}

impl ReferenceStoreConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for a zero queue capacity or timeout.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.queue_capacity == 0 {
            return Err(StoreError::Invalid("queue_capacity must be greater than zero".to_string()));
        }
        if self.reply_timeout.is_some_and(|timeout| timeout.is_zero()) {
            return Err(StoreError::Invalid("reply_timeout must be greater than zero".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Shutdown Report
// ============================================================================

/// Summary returned by a successful shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Lookups served over the store's lifetime.
    pub processed: u64,
    /// Keys held by the cache when the worker stopped.
    pub cache_entries: usize,
    /// Entries written to the snapshot, when one was saved.
    pub snapshot_entries: Option<usize>,
}

// ============================================================================
// SECTION: Reference Store
// ============================================================================

/// Handle to a running reference store.
#[derive(Clone)]
pub struct ReferenceStore {
    /// Submission side of the router.
    gateway: Arc<RouterGateway>,
    /// Router thread, taken on shutdown.
    worker: Arc<Mutex<Option<JoinHandle<ResponseCache>>>>,
    /// Configuration captured at open.
    config: Arc<ReferenceStoreConfig>,
}

impl ReferenceStore {
    /// Starts the router thread over `backend`.
    ///
    /// When caching is enabled and a snapshot path is set, the snapshot is
    /// loaded first. A missing or unreadable snapshot leaves the cache empty.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the configuration is invalid or the router
    /// thread cannot be spawned.
    pub fn open<B>(backend: B, config: ReferenceStoreConfig) -> Result<Self, StoreError>
    where
        B: CharacterBackend + 'static,
    {
        config.validate()?;
        let cache = initial_cache(&config.cache);
        let (sender, receiver) = mpsc::sync_channel(config.queue_capacity);
        let counters = Arc::new(RouterCounters::default());
        let handle =
            spawn_router(backend, cache, config.cache.enabled, receiver, Arc::clone(&counters))?;
        let gateway = RouterGateway::new(sender, counters, config.reply_timeout);
        info!(
            queue_capacity = config.queue_capacity,
            cache_enabled = config.cache.enabled,
            "reference store opened"
        );
        Ok(Self {
            gateway: Arc::new(gateway),
            worker: Arc::new(Mutex::new(Some(handle))),
            config: Arc::new(config),
        })
    }

    /// Resolves a filter through the cache and backend.
    ///
    /// Backend query failures produce a [`crate::LookupSource::Degraded`] reply
    /// rather than an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreClosed`] after shutdown began,
    /// [`StoreError::Timeout`] when the reply timeout elapses, and
    /// [`StoreError::WorkerFailed`] when the router thread died.
    pub fn lookup(&self, filter: LookupFilter) -> Result<Lookup, StoreError> {
        self.gateway.lookup(filter)
    }

    /// Looks up `term` by lookup kind, returning results and their count.
    ///
    /// # Errors
    ///
    /// See [`ReferenceStore::lookup`].
    pub fn get(&self, kind: LookupKind, term: &str) -> Result<(ResultSet, usize), StoreError> {
        let lookup = self.lookup(kind.filter(term))?;
        let count = lookup.results.len();
        Ok((lookup.results, count))
    }

    /// Looks up records whose character contains `term`.
    ///
    /// # Errors
    ///
    /// See [`ReferenceStore::lookup`].
    pub fn get_by_character(&self, term: &str) -> Result<(ResultSet, usize), StoreError> {
        self.get(LookupKind::Character, term)
    }

    /// Looks up records by zhuyin, honoring a trailing tone digit.
    ///
    /// # Errors
    ///
    /// See [`ReferenceStore::lookup`].
    pub fn get_by_zhuyin(&self, term: &str) -> Result<(ResultSet, usize), StoreError> {
        self.get(LookupKind::Zhuyin, term)
    }

    /// Looks up records by pinyin, honoring a trailing tone digit.
    ///
    /// # Errors
    ///
    /// See [`ReferenceStore::lookup`].
    pub fn get_by_pinyin(&self, term: &str) -> Result<(ResultSet, usize), StoreError> {
        self.get(LookupKind::Pinyin, term)
    }

    /// Looks up records whose definition contains `term`.
    ///
    /// # Errors
    ///
    /// See [`ReferenceStore::lookup`].
    pub fn get_by_definition(&self, term: &str) -> Result<(ResultSet, usize), StoreError> {
        self.get(LookupKind::Definition, term)
    }

    /// Looks up a phonetic term in one system.
    ///
    /// # Errors
    ///
    /// See [`ReferenceStore::lookup`].
    pub fn get_by_phonetic(
        &self,
        system: PhoneticSystem,
        term: &str,
    ) -> Result<(ResultSet, usize), StoreError> {
        let kind = match system {
            PhoneticSystem::Zhuyin => LookupKind::Zhuyin,
            PhoneticSystem::Pinyin => LookupKind::Pinyin,
        };
        self.get(kind, term)
    }

    /// Returns a sorted copy of the cache, read in queue order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] under the same conditions as
    /// [`ReferenceStore::lookup`].
    pub fn cache_entries(&self) -> Result<BTreeMap<CacheKey, ResultSet>, StoreError> {
        self.gateway.cache_entries()
    }

    /// Returns the current router counters.
    #[must_use]
    pub fn stats(&self) -> RouterStatsSnapshot {
        self.gateway.counters().snapshot()
    }

    /// Returns the router lifecycle state.
    #[must_use]
    pub fn state(&self) -> RouterState {
        self.gateway.counters().state()
    }

    /// Stops accepting requests, drains the queue, and releases storage.
    ///
    /// Requests already queued are served before the worker stops. The cache
    /// snapshot is written after the backend has been released.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::StoreClosed`] when shutdown already ran,
    /// [`StoreError::WorkerFailed`] when the router thread panicked, and
    /// [`StoreError::CacheSaveFailed`] when the snapshot could not be written
    /// (the store is closed regardless).
    pub fn shutdown(&self) -> Result<ShutdownReport, StoreError> {
        let sender = self.gateway.close()?;
        let counters = self.gateway.counters();
        counters.set_state(RouterState::Draining);
        info!(pending = counters.snapshot().pending, "reference store draining");
        drop(sender);
        let handle = {
            let mut guard = self.worker.lock().map_err(|_| {
                StoreError::WorkerFailed("router handle mutex poisoned".to_string())
            })?;
            guard.take()
        };
        let Some(handle) = handle else {
            counters.set_state(RouterState::Closed);
            return Err(StoreError::StoreClosed);
        };
        let joined = handle.join();
        counters.set_state(RouterState::Closed);
        let cache = joined
            .map_err(|_| StoreError::WorkerFailed("router thread panicked".to_string()))?;
        let processed = counters.processed();
        let snapshot_entries = self.persist_cache(&cache)?;
        info!(processed, cache_entries = cache.len(), "reference store closed");
        Ok(ShutdownReport {
            processed,
            cache_entries: cache.len(),
            snapshot_entries,
        })
    }

    /// Writes the cache snapshot when caching and a snapshot path are configured.
    fn persist_cache(&self, cache: &ResponseCache) -> Result<Option<usize>, StoreError> {
        let settings = &self.config.cache;
        let Some(path) = settings.snapshot_path.as_deref().filter(|_| settings.enabled) else {
            return Ok(None);
        };
        match save_snapshot(path, cache) {
            Ok(count) => {
                info!(path = %path.display(), entries = count, "cache snapshot saved");
                Ok(Some(count))
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "cache snapshot save failed");
                Err(StoreError::CacheSaveFailed(err.to_string()))
            }
        }
    }
}

/// Loads the configured snapshot, falling back to an empty cache.
fn initial_cache(settings: &CacheSettings) -> ResponseCache {
    if !settings.enabled {
        return ResponseCache::new();
    }
    let Some(path) = settings.snapshot_path.as_deref() else {
        return ResponseCache::new();
    };
    match load_snapshot(path) {
        Ok(cache) => {
            info!(path = %path.display(), entries = cache.len(), "cache snapshot loaded");
            cache
        }
        Err(SnapshotError::Missing(_)) => {
            info!(path = %path.display(), "no cache snapshot; starting cold");
            ResponseCache::new()
        }
        Err(err) => {
            let err = StoreError::CacheLoadFailed(err.to_string());
            warn!(path = %path.display(), error = %err, "ignoring cache snapshot");
            ResponseCache::new()
        }
    }
}
