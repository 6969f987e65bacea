// crates/hanzi-ref-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Character Backend
// Description: CharacterBackend over the SQLite `characters` table.
// Purpose: Translate lookup filters into ordered, capped SQL queries.
// Dependencies: hanzi-ref-core, rusqlite, serde, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`SqliteCharacterBackend`] owns one `SQLite` connection and is meant to be
//! moved into the reference store's router thread, which is then the only
//! code that ever touches it. Each [`LookupFilter`] becomes a single
//! parameterized `SELECT`: unset dimensions bind `NULL` and drop out of the
//! `WHERE` clause, text dimensions use `LIKE` substring patterns with escaped
//! wildcards, and rows come back `freq DESC, id ASC` under a `LIMIT`.
//!
//! Rows are decoded one by one. A row that cannot become a
//! [`CharacterRecord`] is reported and skipped; the query keeps going.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;

use hanzi_ref_core::BackendError;
use hanzi_ref_core::CharacterBackend;
use hanzi_ref_core::CharacterRecord;
use hanzi_ref_core::LookupFilter;
use hanzi_ref_core::MAX_CHARACTER_CODEPOINTS;
use hanzi_ref_core::QueryRows;
use hanzi_ref_core::ReferenceStore;
use hanzi_ref_core::ReferenceStoreConfig;
use hanzi_ref_core::StoreError;
use hanzi_ref_core::Tone;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use tracing::info;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms) for the `SQLite` connection.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Stored tone value meaning "unspecified".
const UNSPECIFIED_TONE: i64 = -1;

/// Dictionary schema. The `phrases` table is created for compatibility with
/// existing dictionary files but is not queried.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS characters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    character VARCHAR(4),
    zhuyin VARCHAR(12),
    pinyin VARCHAR(5),
    tone INTEGER,
    definition VARCHAR(50),
    freq INT
);
CREATE TABLE IF NOT EXISTS phrases (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    character INT,
    phrase VARCHAR(50),
    definition TEXT,
    freq INT
);
CREATE INDEX IF NOT EXISTS characters_by_freq ON characters (freq DESC, id ASC);
";

/// Filter query. Each optional parameter is `NULL` when the dimension is unset.
///
/// There is no `LIMIT`: rows that fail to decode must not consume result
/// slots, so the cursor is stepped until enough records have decoded.
const SELECT_CHARACTERS_SQL: &str = r"
SELECT id, character, zhuyin, pinyin, tone, definition, freq
FROM characters
WHERE (?1 IS NULL OR id = ?1)
  AND (?2 IS NULL OR character LIKE ?2 ESCAPE '\')
  AND (?3 IS NULL OR zhuyin LIKE ?3 ESCAPE '\')
  AND (?4 IS NULL OR pinyin LIKE ?4 ESCAPE '\')
  AND (?5 IS NULL OR tone = ?5)
  AND (?6 IS NULL OR definition LIKE ?6 ESCAPE '\')
ORDER BY freq DESC, id ASC
";

/// Insert statement used when seeding a dictionary.
const INSERT_CHARACTER_SQL: &str = "
INSERT INTO characters (id, character, zhuyin, pinyin, tone, definition, freq)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode.
    #[default]
    Wal,
    /// Rollback journal deleted after each transaction.
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Connection settings for the dictionary database.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteBackendConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    pub sync_mode: SqliteSyncMode,
}

impl SqliteBackendConfig {
    /// Returns a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` backend errors.
///
/// # Invariants
/// - Error messages avoid embedding dictionary payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Filesystem error around the database file.
    #[error("sqlite backend io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite backend db error: {0}")]
    Db(String),
    /// Invalid configuration or input.
    #[error("sqlite backend invalid input: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for BackendError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Unavailable(error.to_string())
    }
}

// ============================================================================
// SECTION: Backend
// ============================================================================

/// `SQLite`-backed character dictionary.
///
/// # Invariants
/// - Exactly one connection, used from one thread at a time.
pub struct SqliteCharacterBackend {
    /// Open connection with pragmas applied and schema initialized.
    connection: Connection,
}

impl SqliteCharacterBackend {
    /// Opens (creating if needed) the dictionary database.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is unsafe, the file cannot be
    /// opened, or the schema cannot be created.
    pub fn open(config: &SqliteBackendConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let connection = open_connection(config)?;
        initialize_schema(&connection)?;
        info!(
            path = %config.path.display(),
            journal_mode = config.journal_mode.pragma_value(),
            sync_mode = config.sync_mode.pragma_value(),
            "sqlite character backend opened"
        );
        Ok(Self {
            connection,
        })
    }

    /// Inserts records in one transaction, returning how many were written.
    ///
    /// Records keep their ids; an id collision fails the whole batch.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Db`] when any insert fails.
    pub fn insert_records(&mut self, records: &[CharacterRecord]) -> Result<usize, SqliteStoreError> {
        let tx = self.connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        {
            let mut statement = tx
                .prepare_cached(INSERT_CHARACTER_SQL)
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            for record in records {
                statement
                    .execute(params![
                        record.id,
                        record.character,
                        record.zhuyin,
                        record.pinyin,
                        record.tone.map_or(UNSPECIFIED_TONE, i64::from),
                        record.definition,
                        record.freq,
                    ])
                    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            }
        }
        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(records.len())
    }
}

impl CharacterBackend for SqliteCharacterBackend {
    fn query(&mut self, filter: &LookupFilter, limit: usize) -> Result<QueryRows, BackendError> {
        let started = Instant::now();
        let mut statement = self
            .connection
            .prepare_cached(SELECT_CHARACTERS_SQL)
            .map_err(|err| BackendError::QueryFailed(err.to_string()))?;
        let mut rows = statement
            .query(params![
                filter.id,
                filter.character.as_deref().map(like_pattern),
                filter.zhuyin.as_deref().map(like_pattern),
                filter.pinyin.as_deref().map(like_pattern),
                filter.tone.map(i64::from),
                filter.definition.as_deref().map(like_pattern),
            ])
            .map_err(|err| BackendError::QueryFailed(err.to_string()))?;
        let mut output = QueryRows::default();
        while output.records.len() < limit
            && let Some(row) = rows.next().map_err(|err| BackendError::QueryFailed(err.to_string()))?
        {
            match decode_row(row) {
                Ok(record) => output.records.push(record),
                Err(err) => output.skipped.push(err),
            }
        }
        debug!(
            elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
            rows = output.records.len(),
            skipped = output.skipped.len(),
            "sqlite character query complete"
        );
        Ok(output)
    }
}

// ============================================================================
// SECTION: Store Helpers
// ============================================================================

/// Opens the dictionary and starts a reference store over it.
///
/// # Errors
///
/// Returns [`StoreError::StorageUnavailable`] when the database cannot be
/// opened, or any error from [`ReferenceStore::open`].
pub fn open_reference_store(
    sqlite: &SqliteBackendConfig,
    store: ReferenceStoreConfig,
) -> Result<ReferenceStore, StoreError> {
    let backend = SqliteCharacterBackend::open(sqlite)
        .map_err(|err| StoreError::StorageUnavailable(err.to_string()))?;
    ReferenceStore::open(backend, store)
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Materializes one row, rejecting malformed columns.
fn decode_row(row: &Row<'_>) -> Result<CharacterRecord, BackendError> {
    let row_id = row.get::<_, i64>(0).ok();
    let failed = |message: String| BackendError::DecodeFailed {
        row_id,
        message,
    };
    let id: i64 = row.get(0).map_err(|err| failed(err.to_string()))?;
    let character: String = row.get(1).map_err(|err| failed(err.to_string()))?;
    let codepoints = character.chars().count();
    if codepoints == 0 || codepoints > MAX_CHARACTER_CODEPOINTS {
        return Err(failed(format!(
            "character must have 1-{MAX_CHARACTER_CODEPOINTS} codepoints, found {codepoints}"
        )));
    }
    let zhuyin: Option<String> = row.get(2).map_err(|err| failed(err.to_string()))?;
    let pinyin: Option<String> = row.get(3).map_err(|err| failed(err.to_string()))?;
    let tone: Option<i64> = row.get(4).map_err(|err| failed(err.to_string()))?;
    let tone = match tone {
        None | Some(UNSPECIFIED_TONE) => None,
        Some(value) => Some(Tone::try_from(value).map_err(|err| failed(err.to_string()))?),
    };
    let definition: Option<String> = row.get(5).map_err(|err| failed(err.to_string()))?;
    let freq: Option<i64> = row.get(6).map_err(|err| failed(err.to_string()))?;
    Ok(CharacterRecord {
        id,
        character,
        zhuyin: zhuyin.unwrap_or_default(),
        pinyin: pinyin.unwrap_or_default(),
        tone,
        definition: definition.unwrap_or_default(),
        freq: freq.unwrap_or_default(),
    })
}

/// Builds a `%term%` pattern with `LIKE` wildcards escaped.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

// ============================================================================
// SECTION: Connection Helpers
// ============================================================================

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("database path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates database paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("database path must not be empty".to_string()));
    }
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("database path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "database path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "database path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens the connection and applies pragmas.
fn open_connection(config: &SqliteBackendConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Creates the dictionary tables when absent.
fn initialize_schema(connection: &Connection) -> Result<(), SqliteStoreError> {
    connection.execute_batch(SCHEMA_SQL).map_err(|err| SqliteStoreError::Db(err.to_string()))
}
