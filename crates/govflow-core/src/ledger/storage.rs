//! `SQLite`-backed ledger storage implementation.

// SQLite returns i64 for row IDs and counts, but they're always non-negative.
// Mutex poisoning indicates a panic in another thread, which is unrecoverable.
#![allow(
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation,
    clippy::missing_panics_doc
)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;
use tracing::error;

use crate::crypto::{ContentHasher, HASH_SIZE, Hash, hex_encode};
use crate::error::ErrorKind;
use crate::events::{EventSink, GovernanceEvent};

/// Schema SQL embedded at compile time.
const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Database error from `SQLite`.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Event not found.
    #[error("event not found: seq_id={seq_id}")]
    EventNotFound {
        /// The sequence ID that was not found.
        seq_id: u64,
    },

    /// Hash chain verification failed.
    #[error("hash chain broken at seq_id={seq_id}: {details}")]
    HashChainBroken {
        /// The sequence ID where the chain broke.
        seq_id: u64,
        /// Details about the failure.
        details: String,
    },

    /// A stored hash column has the wrong length.
    #[error("malformed hash at seq_id={seq_id}: expected {expected} bytes, got {actual}")]
    MalformedHash {
        /// The sequence ID with the malformed hash.
        seq_id: u64,
        /// The expected number of bytes.
        expected: usize,
        /// The actual number of bytes.
        actual: usize,
    },
}

impl LedgerError {
    /// Returns the cross-cutting classification of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Database(_) | Self::Io(_) => ErrorKind::Io,
            Self::EventNotFound { .. } => ErrorKind::NotFound,
            Self::HashChainBroken { .. } | Self::MalformedHash { .. } => ErrorKind::Integrity,
        }
    }
}

/// A single event row read back from the ledger.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct LedgerRecord {
    /// Sequence ID assigned on append.
    pub seq_id: u64,

    /// Event type identifier.
    pub event_type: String,

    /// Tenant the event belongs to.
    pub tenant_id: String,

    /// The work item or run the event is about.
    pub subject_id: String,

    /// Severity or state the subject transitioned to.
    pub detail: String,

    /// Timestamp in nanoseconds since Unix epoch.
    pub timestamp_ns: u64,

    /// Canonical payload bytes the hash covers.
    pub payload: Vec<u8>,

    /// Hash of the previous event.
    pub prev_hash: Vec<u8>,

    /// Hash of this event.
    pub event_hash: Vec<u8>,
}

/// Summary statistics for a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerStats {
    /// Total number of events.
    pub event_count: u64,

    /// Timestamp of the first event, if any.
    pub first_timestamp_ns: Option<u64>,

    /// Timestamp of the last event, if any.
    pub last_timestamp_ns: Option<u64>,
}

/// Append-only, hash-chained governance event ledger.
pub struct Ledger {
    conn: Arc<Mutex<Connection>>,
}

impl Ledger {
    /// Opens (or creates) a ledger at the given path, enabling WAL mode.
    ///
    /// # Errors
    ///
    /// Returns a database error if the file cannot be opened or the schema
    /// cannot be applied.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LedgerError> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory ledger (tests and ephemeral embedding).
    ///
    /// # Errors
    ///
    /// Returns a database error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Appends one event, linking it to the chain head.
    ///
    /// Returns the assigned sequence ID.
    ///
    /// # Errors
    ///
    /// Returns a database error if the insert fails.
    pub fn append(&self, event: &GovernanceEvent) -> Result<u64, LedgerError> {
        let payload = event.canonical_bytes();
        let timestamp_ns = event
            .timestamp
            .timestamp_nanos_opt()
            .unwrap_or_default()
            .max(0) as u64;

        let conn = self.conn.lock().expect("lock poisoned");

        let prev_hash: Hash = conn
            .query_row(
                "SELECT event_hash FROM governance_events ORDER BY seq_id DESC LIMIT 1",
                [],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?
            .map_or(ContentHasher::GENESIS_PREV_HASH, |bytes| {
                let mut hash = ContentHasher::GENESIS_PREV_HASH;
                if bytes.len() == HASH_SIZE {
                    hash.copy_from_slice(&bytes);
                }
                hash
            });

        let event_hash = ContentHasher::hash_event(&payload, &prev_hash);

        conn.execute(
            "INSERT INTO governance_events \
             (event_type, tenant_id, subject_id, detail, timestamp_ns, payload, prev_hash, event_hash) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.event_type,
                event.tenant_id,
                event.subject_id,
                event.detail,
                timestamp_ns as i64,
                payload,
                prev_hash.as_slice(),
                event_hash.as_slice(),
            ],
        )?;

        Ok(conn.last_insert_rowid() as u64)
    }

    /// Reads up to `limit` events with `seq_id > cursor`, in order.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub fn read_from(&self, cursor: u64, limit: u32) -> Result<Vec<LedgerRecord>, LedgerError> {
        let conn = self.conn.lock().expect("lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT seq_id, event_type, tenant_id, subject_id, detail, timestamp_ns, \
                    payload, prev_hash, event_hash \
             FROM governance_events WHERE seq_id > ?1 ORDER BY seq_id LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![cursor as i64, i64::from(limit)], |row| {
            Ok(LedgerRecord {
                seq_id: row.get::<_, i64>(0)? as u64,
                event_type: row.get(1)?,
                tenant_id: row.get(2)?,
                subject_id: row.get(3)?,
                detail: row.get(4)?,
                timestamp_ns: row.get::<_, i64>(5)? as u64,
                payload: row.get(6)?,
                prev_hash: row.get(7)?,
                event_hash: row.get(8)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Verifies the entire hash chain from genesis.
    ///
    /// # Errors
    ///
    /// Returns `HashChainBroken` at the first row whose link or hash fails.
    pub fn verify_chain(&self) -> Result<(), LedgerError> {
        let records = self.read_from(0, u32::MAX)?;
        let mut expected_prev = ContentHasher::GENESIS_PREV_HASH;

        for record in records {
            let prev_hash = as_hash(&record.prev_hash, record.seq_id)?;
            let event_hash = as_hash(&record.event_hash, record.seq_id)?;

            ContentHasher::verify_chain_link(&prev_hash, &expected_prev).map_err(|e| {
                LedgerError::HashChainBroken {
                    seq_id: record.seq_id,
                    details: e.to_string(),
                }
            })?;
            ContentHasher::verify_event_hash(&record.payload, &prev_hash, &event_hash).map_err(
                |e| LedgerError::HashChainBroken {
                    seq_id: record.seq_id,
                    details: e.to_string(),
                },
            )?;

            expected_prev = event_hash;
        }
        Ok(())
    }

    /// Returns summary statistics.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub fn stats(&self) -> Result<LedgerStats, LedgerError> {
        let conn = self.conn.lock().expect("lock poisoned");
        let (count, first, last): (i64, Option<i64>, Option<i64>) = conn.query_row(
            "SELECT COUNT(*), MIN(timestamp_ns), MAX(timestamp_ns) FROM governance_events",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(LedgerStats {
            event_count: count as u64,
            first_timestamp_ns: first.map(|v| v as u64),
            last_timestamp_ns: last.map(|v| v as u64),
        })
    }

    /// Runs a closure against the raw connection (test hook for tampering).
    #[cfg(test)]
    pub(crate) fn with_raw_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, LedgerError> {
        let conn = self.conn.lock().expect("lock poisoned");
        f(&conn).map_err(Into::into)
    }

    /// Returns the hex-encoded chain head hash, if any events exist.
    ///
    /// # Errors
    ///
    /// Returns a database error if the query fails.
    pub fn head_hash_hex(&self) -> Result<Option<String>, LedgerError> {
        let conn = self.conn.lock().expect("lock poisoned");
        let head: Option<Vec<u8>> = conn
            .query_row(
                "SELECT event_hash FROM governance_events ORDER BY seq_id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(head.map(|bytes| hex_encode(&bytes)))
    }
}

impl Clone for Ledger {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

fn as_hash(bytes: &[u8], seq_id: u64) -> Result<Hash, LedgerError> {
    let mut hash = ContentHasher::GENESIS_PREV_HASH;
    if bytes.len() != HASH_SIZE {
        return Err(LedgerError::MalformedHash {
            seq_id,
            expected: HASH_SIZE,
            actual: bytes.len(),
        });
    }
    hash.copy_from_slice(bytes);
    Ok(hash)
}

/// Event sink that appends every emitted event to the audit ledger.
///
/// Append failures are operational alerts, not caller errors: the emitting
/// transition has already committed, so the sink logs and moves on.
pub struct LedgerEventSink {
    ledger: Ledger,
}

impl LedgerEventSink {
    /// Creates a sink over a ledger handle.
    #[must_use]
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }
}

impl EventSink for LedgerEventSink {
    fn emit(&self, event: GovernanceEvent) {
        if let Err(e) = self.ledger.append(&event) {
            error!(
                event_type = %event.event_type,
                tenant_id = %event.tenant_id,
                %e,
                "failed to append governance event to audit ledger"
            );
        }
    }
}
