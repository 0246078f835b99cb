//! Tests for the audit ledger.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;

use super::storage::{Ledger, LedgerError, LedgerEventSink};
use crate::events::{EVENT_SLA_SEVERITY_CHANGED, EVENT_WORK_ITEM_SUBMITTED, EventSink, GovernanceEvent};

fn ts() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-03-01T09:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn event(event_type: &str, subject: &str, detail: &str, at: DateTime<Utc>) -> GovernanceEvent {
    GovernanceEvent::new(event_type, "tenant-a", subject, detail, at)
}

#[test]
fn test_append_assigns_increasing_seq_ids() {
    let ledger = Ledger::in_memory().unwrap();
    let a = ledger
        .append(&event(EVENT_WORK_ITEM_SUBMITTED, "item-1", "SUBMITTED", ts()))
        .unwrap();
    let b = ledger
        .append(&event(EVENT_SLA_SEVERITY_CHANGED, "item-2", "LATE", ts()))
        .unwrap();
    assert!(b > a);
}

#[test]
fn test_read_from_cursor() {
    let ledger = Ledger::in_memory().unwrap();
    for i in 0..5 {
        ledger
            .append(&event(
                EVENT_WORK_ITEM_SUBMITTED,
                &format!("item-{i}"),
                "SUBMITTED",
                ts() + Duration::minutes(i),
            ))
            .unwrap();
    }

    let all = ledger.read_from(0, 100).unwrap();
    assert_eq!(all.len(), 5);

    let tail = ledger.read_from(3, 100).unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].subject_id, "item-3");

    let page = ledger.read_from(0, 2).unwrap();
    assert_eq!(page.len(), 2);
}

#[test]
fn test_chain_verifies_over_appended_events() {
    let ledger = Ledger::in_memory().unwrap();
    for i in 0..10 {
        ledger
            .append(&event(
                EVENT_SLA_SEVERITY_CHANGED,
                &format!("item-{i}"),
                "DUE_SOON",
                ts() + Duration::minutes(i),
            ))
            .unwrap();
    }
    ledger.verify_chain().unwrap();
}

#[test]
fn test_empty_ledger_chain_verifies() {
    let ledger = Ledger::in_memory().unwrap();
    ledger.verify_chain().unwrap();
    assert_eq!(ledger.head_hash_hex().unwrap(), None);
}

#[test]
fn test_tampered_payload_breaks_chain() {
    let ledger = Ledger::in_memory().unwrap();
    ledger
        .append(&event(EVENT_WORK_ITEM_SUBMITTED, "item-1", "SUBMITTED", ts()))
        .unwrap();
    ledger
        .append(&event(EVENT_WORK_ITEM_SUBMITTED, "item-2", "SUBMITTED", ts()))
        .unwrap();

    // Tamper with a committed row behind the chain's back.
    ledger
        .with_raw_connection(|conn| {
            conn.execute(
                "UPDATE governance_events SET payload = ?1 WHERE seq_id = 1",
                params![b"forged".to_vec()],
            )
            .map(|_| ())
        })
        .unwrap();

    let result = ledger.verify_chain();
    assert!(matches!(result, Err(LedgerError::HashChainBroken { seq_id: 1, .. })));
}

#[test]
fn test_stats() {
    let ledger = Ledger::in_memory().unwrap();
    let empty = ledger.stats().unwrap();
    assert_eq!(empty.event_count, 0);
    assert!(empty.first_timestamp_ns.is_none());

    ledger
        .append(&event(EVENT_WORK_ITEM_SUBMITTED, "item-1", "SUBMITTED", ts()))
        .unwrap();
    ledger
        .append(&event(
            EVENT_SLA_SEVERITY_CHANGED,
            "item-1",
            "LATE",
            ts() + Duration::hours(30),
        ))
        .unwrap();

    let stats = ledger.stats().unwrap();
    assert_eq!(stats.event_count, 2);
    assert!(stats.last_timestamp_ns > stats.first_timestamp_ns);
}

#[test]
fn test_file_backed_ledger_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.db");

    {
        let ledger = Ledger::open(&path).unwrap();
        ledger
            .append(&event(EVENT_WORK_ITEM_SUBMITTED, "item-1", "SUBMITTED", ts()))
            .unwrap();
    }

    let reopened = Ledger::open(&path).unwrap();
    assert_eq!(reopened.stats().unwrap().event_count, 1);
    reopened.verify_chain().unwrap();
}

#[test]
fn test_ledger_event_sink_appends() {
    let ledger = Ledger::in_memory().unwrap();
    let sink = LedgerEventSink::new(ledger.clone());

    sink.emit(event(EVENT_WORK_ITEM_SUBMITTED, "item-1", "SUBMITTED", ts()));
    sink.emit(event(EVENT_SLA_SEVERITY_CHANGED, "item-1", "ESCALATED", ts()));

    assert_eq!(ledger.stats().unwrap().event_count, 2);
    let records = ledger.read_from(0, 10).unwrap();
    assert_eq!(records[1].detail, "ESCALATED");
    ledger.verify_chain().unwrap();
}
