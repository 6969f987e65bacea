// crates/hanzi-ref-core/src/runtime/router.rs
// ============================================================================
// Module: Request Router
// Description: Single worker thread that owns the backend and response cache.
// Purpose: Serialize all storage access into one FIFO request stream.
// Dependencies: crate::{core, interfaces, runtime::cache}, tracing
// ============================================================================

//! ## Overview
//! Callers submit [`RouterCommand`]s through a [`RouterGateway`] and block on a
//! private reply channel. The worker drains the queue in arrival order, one
//! command at a time: cache check, backend query on miss, cache update, reply.
//! Only phonetic-only lookups read or write the cache.
//! No other thread ever touches the backend or the cache.
//!
//! Shutdown drops the gateway's sender. Commands already queued are still
//! served because the worker only stops once the channel is both empty and
//! disconnected; the worker then returns the cache to the joining thread.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::mpsc::SyncSender;
use std::thread;
use std::thread::JoinHandle;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::LookupFilter;
use crate::core::MAX_RESULTS;
use crate::core::ResultSet;
use crate::interfaces::BackendError;
use crate::interfaces::CharacterBackend;
use crate::runtime::cache::CacheKey;
use crate::runtime::cache::ResponseCache;
use crate::runtime::store::StoreError;

// ============================================================================
// SECTION: Replies
// ============================================================================

/// Where a lookup reply came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    /// Served from the response cache without touching storage.
    Cache,
    /// Served by a backend query.
    Backend,
    /// The backend query failed; the result set is empty.
    Degraded,
}

impl LookupSource {
    /// Returns a stable label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Backend => "backend",
            Self::Degraded => "degraded",
        }
    }
}

/// Reply to one lookup request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookup {
    /// Matched records.
    pub results: ResultSet,
    /// Reply origin.
    pub source: LookupSource,
    /// Position of this request in the worker's service order (starts at 1).
    pub served_sequence: u64,
    /// Rows the backend skipped because they failed to decode.
    pub skipped_rows: usize,
    /// Backend failure behind a [`LookupSource::Degraded`] reply.
    pub failure: Option<BackendError>,
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Command queued to the router thread.
pub(crate) enum RouterCommand {
    /// Resolve a lookup filter.
    Lookup {
        /// Filter to resolve.
        filter: LookupFilter,
        /// Submit time, used to report queue wait.
        enqueued_at: Instant,
        /// Private reply channel.
        response: mpsc::Sender<Lookup>,
    },
    /// Copy out the current cache entries.
    CacheEntries {
        /// Private reply channel.
        response: mpsc::Sender<BTreeMap<CacheKey, ResultSet>>,
    },
}

// ============================================================================
// SECTION: State and Counters
// ============================================================================

/// Router lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterState {
    /// Accepting and serving requests.
    Running,
    /// Submissions closed; queued requests are still being served.
    Draining,
    /// Worker stopped and storage released.
    Closed,
}

impl RouterState {
    /// Encodes the state for atomic storage.
    const fn to_u8(self) -> u8 {
        match self {
            Self::Running => 0,
            Self::Draining => 1,
            Self::Closed => 2,
        }
    }

    /// Decodes an atomically stored state.
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Closed,
        }
    }
}

/// Point-in-time router counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStatsSnapshot {
    /// Lifecycle state.
    pub state: RouterState,
    /// Commands accepted into the queue.
    pub enqueued: u64,
    /// Submissions rejected because the store was closed.
    pub rejected: u64,
    /// Lookups fully served.
    pub processed: u64,
    /// Commands queued or in flight.
    pub pending: usize,
    /// Lookups answered from the cache.
    pub cache_hits: u64,
    /// Lookups that went to the backend.
    pub cache_misses: u64,
    /// Backend queries that failed.
    pub query_failures: u64,
    /// Rows skipped by the backend on decode failure.
    pub skipped_rows: u64,
    /// Keys currently held by the cache.
    pub cache_entries: usize,
}

/// Shared atomic counters updated by callers and the worker.
#[derive(Debug, Default)]
pub(crate) struct RouterCounters {
    /// Encoded [`RouterState`].
    state: AtomicU8,
    /// Commands accepted into the queue.
    enqueued: AtomicU64,
    /// Rejected submissions.
    rejected: AtomicU64,
    /// Lookups served.
    processed: AtomicU64,
    /// Commands queued or in flight.
    pending: AtomicUsize,
    /// Cache hits.
    cache_hits: AtomicU64,
    /// Cache misses.
    cache_misses: AtomicU64,
    /// Backend query failures.
    query_failures: AtomicU64,
    /// Skipped rows.
    skipped_rows: AtomicU64,
    /// Cache key count.
    cache_entries: AtomicUsize,
}

impl RouterCounters {
    /// Returns the lifecycle state.
    pub(crate) fn state(&self) -> RouterState {
        RouterState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Sets the lifecycle state.
    pub(crate) fn set_state(&self, state: RouterState) {
        self.state.store(state.to_u8(), Ordering::Release);
    }

    /// Returns the number of lookups served.
    pub(crate) fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    /// Captures all counters.
    pub(crate) fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            state: self.state(),
            enqueued: self.enqueued.load(Ordering::Acquire),
            rejected: self.rejected.load(Ordering::Acquire),
            processed: self.processed(),
            pending: self.pending.load(Ordering::Acquire),
            cache_hits: self.cache_hits.load(Ordering::Acquire),
            cache_misses: self.cache_misses.load(Ordering::Acquire),
            query_failures: self.query_failures.load(Ordering::Acquire),
            skipped_rows: self.skipped_rows.load(Ordering::Acquire),
            cache_entries: self.cache_entries.load(Ordering::Acquire),
        }
    }
}

// ============================================================================
// SECTION: Gateway
// ============================================================================

/// Caller-side handle for submitting commands to the router.
pub(crate) struct RouterGateway {
    /// Queue sender; `None` once submissions are closed.
    sender: Mutex<Option<SyncSender<RouterCommand>>>,
    /// Shared counters.
    counters: Arc<RouterCounters>,
    /// Optional bound on how long a caller waits for its reply.
    reply_timeout: Option<Duration>,
}

impl RouterGateway {
    /// Creates a gateway over an open queue.
    pub(crate) const fn new(
        sender: SyncSender<RouterCommand>,
        counters: Arc<RouterCounters>,
        reply_timeout: Option<Duration>,
    ) -> Self {
        Self {
            sender: Mutex::new(Some(sender)),
            counters,
            reply_timeout,
        }
    }

    /// Returns the shared counters.
    pub(crate) fn counters(&self) -> &RouterCounters {
        &self.counters
    }

    /// Submits a lookup and blocks until the worker replies.
    pub(crate) fn lookup(&self, filter: LookupFilter) -> Result<Lookup, StoreError> {
        let (response_tx, response_rx) = mpsc::channel();
        self.submit(RouterCommand::Lookup {
            filter,
            enqueued_at: Instant::now(),
            response: response_tx,
        })?;
        self.await_reply(&response_rx)
    }

    /// Requests a copy of the worker's cache entries.
    pub(crate) fn cache_entries(&self) -> Result<BTreeMap<CacheKey, ResultSet>, StoreError> {
        let (response_tx, response_rx) = mpsc::channel();
        self.submit(RouterCommand::CacheEntries {
            response: response_tx,
        })?;
        self.await_reply(&response_rx)
    }

    /// Closes submissions, returning the sender so the caller controls when it drops.
    pub(crate) fn close(&self) -> Result<SyncSender<RouterCommand>, StoreError> {
        let mut guard = self
            .sender
            .lock()
            .map_err(|_| StoreError::WorkerFailed("router sender mutex poisoned".to_string()))?;
        guard.take().ok_or(StoreError::StoreClosed)
    }

    /// Enqueues a command in FIFO order, blocking while the queue is full.
    fn submit(&self, command: RouterCommand) -> Result<(), StoreError> {
        let sender = {
            let guard = self.sender.lock().map_err(|_| {
                StoreError::WorkerFailed("router sender mutex poisoned".to_string())
            })?;
            guard.clone()
        };
        let Some(sender) = sender else {
            self.counters.rejected.fetch_add(1, Ordering::AcqRel);
            return Err(StoreError::StoreClosed);
        };
        self.counters.pending.fetch_add(1, Ordering::AcqRel);
        if sender.send(command).is_err() {
            self.counters.pending.fetch_sub(1, Ordering::AcqRel);
            self.counters.rejected.fetch_add(1, Ordering::AcqRel);
            return Err(StoreError::StoreClosed);
        }
        self.counters.enqueued.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Waits on a private reply channel, honoring the reply timeout.
    fn await_reply<T>(&self, response: &Receiver<T>) -> Result<T, StoreError> {
        let Some(timeout) = self.reply_timeout else {
            return response.recv().map_err(|_| {
                StoreError::WorkerFailed("router dropped reply channel".to_string())
            });
        };
        response.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => StoreError::Timeout {
                waited_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => {
                StoreError::WorkerFailed("router dropped reply channel".to_string())
            }
        })
    }
}

// ============================================================================
// SECTION: Worker
// ============================================================================

/// Spawns the dedicated router thread.
///
/// The thread returns the cache once the queue is drained and closed.
pub(crate) fn spawn_router<B>(
    backend: B,
    cache: ResponseCache,
    cache_enabled: bool,
    receiver: Receiver<RouterCommand>,
    counters: Arc<RouterCounters>,
) -> Result<JoinHandle<ResponseCache>, StoreError>
where
    B: CharacterBackend + 'static,
{
    thread::Builder::new()
        .name("hanzi-ref-router".to_string())
        .spawn(move || {
            let mut worker = RouterWorker {
                backend,
                cache,
                cache_enabled,
                sequence: 0,
            };
            worker.run(&receiver, &counters);
            worker.cache
        })
        .map_err(|err| StoreError::WorkerFailed(format!("failed to spawn router thread: {err}")))
}

/// State owned exclusively by the router thread.
struct RouterWorker<B> {
    /// Storage backend.
    backend: B,
    /// Response cache.
    cache: ResponseCache,
    /// Consult and populate the cache.
    cache_enabled: bool,
    /// Lookups served so far.
    sequence: u64,
}

impl<B: CharacterBackend> RouterWorker<B> {
    /// Serves commands strictly one at a time until the queue closes.
    fn run(&mut self, receiver: &Receiver<RouterCommand>, counters: &RouterCounters) {
        info!(cache_entries = self.cache.len(), "reference router started");
        counters.cache_entries.store(self.cache.len(), Ordering::Release);
        while let Ok(command) = receiver.recv() {
            match command {
                RouterCommand::Lookup {
                    filter,
                    enqueued_at,
                    response,
                } => {
                    self.sequence = self.sequence.saturating_add(1);
                    let sequence = self.sequence;
                    let wait_us =
                        u64::try_from(enqueued_at.elapsed().as_micros()).unwrap_or(u64::MAX);
                    let lookup = self.route_lookup(&filter, counters);
                    counters.cache_entries.store(self.cache.len(), Ordering::Release);
                    counters.processed.fetch_add(1, Ordering::AcqRel);
                    debug!(
                        sequence,
                        wait_us,
                        source = lookup.source.as_str(),
                        results = lookup.results.len(),
                        "lookup served"
                    );
                    if response.send(lookup).is_err() {
                        debug!(sequence, "caller stopped waiting before reply");
                    }
                }
                RouterCommand::CacheEntries {
                    response,
                } => {
                    let _ = response.send(self.cache.to_sorted_map());
                }
            }
            counters.pending.fetch_sub(1, Ordering::AcqRel);
        }
        info!(
            processed = self.sequence,
            cache_entries = self.cache.len(),
            "reference router drained"
        );
    }

    /// Resolves one lookup: cache check, then backend query and cache update.
    fn route_lookup(&mut self, filter: &LookupFilter, counters: &RouterCounters) -> Lookup {
        let sequence = self.sequence;
        if self.cache_enabled
            && let Some((key, results)) = self.cache.lookup(filter)
        {
            counters.cache_hits.fetch_add(1, Ordering::AcqRel);
            debug!(sequence, key = %key, "cache hit");
            return Lookup {
                results,
                source: LookupSource::Cache,
                served_sequence: sequence,
                skipped_rows: 0,
                failure: None,
            };
        }
        counters.cache_misses.fetch_add(1, Ordering::AcqRel);
        let started = Instant::now();
        match self.backend.query(filter, MAX_RESULTS) {
            Ok(rows) => {
                let skipped_rows = rows.skipped.len();
                if skipped_rows > 0 {
                    counters
                        .skipped_rows
                        .fetch_add(u64::try_from(skipped_rows).unwrap_or(u64::MAX), Ordering::AcqRel);
                    for failure in &rows.skipped {
                        warn!(sequence, error = %failure, "skipped undecodable row");
                    }
                }
                let results = ResultSet::from_records(rows.records);
                let new_keys = if self.cache_enabled && filter.is_phonetic_only() {
                    self.cache.remember(&results)
                } else {
                    0
                };
                debug!(
                    sequence,
                    elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
                    results = results.len(),
                    new_keys,
                    "backend query complete"
                );
                Lookup {
                    results,
                    source: LookupSource::Backend,
                    served_sequence: sequence,
                    skipped_rows,
                    failure: None,
                }
            }
            Err(err) => {
                counters.query_failures.fetch_add(1, Ordering::AcqRel);
                warn!(sequence, error = %err, "backend query failed; replying with empty results");
                Lookup {
                    results: ResultSet::empty(),
                    source: LookupSource::Degraded,
                    served_sequence: sequence,
                    skipped_rows: 0,
                    failure: Some(err),
                }
            }
        }
    }
}
