//! Append-only audit ledger for governance events.
//!
//! This module provides a hash-chained event ledger backed by `SQLite` with
//! WAL mode. Every event the engine emits (lifecycle transitions, SLA
//! severity changes, run milestones) can be durably appended here and later
//! re-verified: each row carries a Blake3 hash over its canonical payload
//! linked to the previous row's hash, so tampering with history breaks the
//! chain.
//!
//! # Features
//!
//! - **Append-only semantics**: events are only ever added
//! - **Hash chaining**: `event_hash = blake3(prev_hash || canonical bytes)`
//! - **Cursor-based reads**: iterate events by sequence number
//! - **WAL mode**: concurrent reads while appends are in progress
//!
//! # Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use govflow_core::events::GovernanceEvent;
//! use govflow_core::ledger::Ledger;
//!
//! # fn example() -> Result<(), govflow_core::ledger::LedgerError> {
//! let ledger = Ledger::open("/var/lib/govflow/audit.db")?;
//!
//! let event = GovernanceEvent::new(
//!     "work_item.approved",
//!     "tenant-a",
//!     "item-42",
//!     "APPROVED",
//!     Utc::now(),
//! );
//! let seq_id = ledger.append(&event)?;
//!
//! ledger.verify_chain()?;
//! # Ok(())
//! # }
//! ```

mod storage;

#[cfg(test)]
mod tests;

pub use storage::{Ledger, LedgerError, LedgerEventSink, LedgerRecord, LedgerStats};
