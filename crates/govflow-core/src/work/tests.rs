//! Tests for the work module.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::error::WorkError;
use super::lifecycle::{LifecycleManager, MemoryWorkItemStore, NewWorkItem};
use super::state::{AuthorityRole, WorkItemKind, WorkItemState};
use crate::events::{EVENT_WORK_ITEM_APPROVED, EVENT_WORK_ITEM_SUBMITTED, MemoryEventSink};
use crate::evidence::{PiiLevel, RecordMetadata, RecordRegistry};
use crate::sla::SlaSeverity;
use crate::work::WorkItemStore;

fn now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2025-01-31T18:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

struct Fixture {
    store: MemoryWorkItemStore,
    registry: RecordRegistry,
    sink: MemoryEventSink,
    manager: LifecycleManager,
}

fn fixture() -> Fixture {
    let store = MemoryWorkItemStore::new();
    let registry = RecordRegistry::new();
    let sink = MemoryEventSink::new();
    let manager = LifecycleManager::new(
        Arc::new(store.clone()),
        registry.clone(),
        Arc::new(sink.clone()),
    );
    Fixture {
        store,
        registry,
        sink,
        manager,
    }
}

fn new_item(evidence_required: bool) -> NewWorkItem {
    NewWorkItem {
        run_id: Some("run-1".to_string()),
        kind: WorkItemKind::CloseTask,
        code: "REC-CASH".to_string(),
        title: "Cash reconciliation".to_string(),
        owner_id: "alice".to_string(),
        approver_id: "bob".to_string(),
        required_role: AuthorityRole::Controller,
        due_at: Some(now() + Duration::days(3)),
        evidence_required,
    }
}

fn insert_item(fixture: &Fixture, evidence_required: bool) -> String {
    let item = new_item(evidence_required).into_item("tenant-a", now());
    let item_id = item.item_id.clone();
    fixture.store.insert(item).unwrap();
    item_id
}

fn link_evidence(fixture: &Fixture, item_id: &str) {
    let record = fixture
        .registry
        .create_record(
            "tenant-a",
            &"a".repeat(64),
            128,
            RecordMetadata {
                source_kind: "CLOSE_TASK".to_string(),
                source_id: item_id.to_string(),
                title: "Bank statement".to_string(),
                note: String::new(),
                tags: BTreeSet::new(),
                pii_level: PiiLevel::None,
            },
            "alice",
            now(),
        )
        .unwrap();
    fixture
        .registry
        .link("tenant-a", &record.record_id, "CLOSE_TASK", item_id, now())
        .unwrap();
}

// =============================================================================
// Submit Tests
// =============================================================================

#[test]
fn test_submit_from_open() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    let item = f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    assert_eq!(item.state, WorkItemState::Submitted);
    assert_eq!(item.submitted_at, Some(now()));

    let events = f.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EVENT_WORK_ITEM_SUBMITTED);
    assert_eq!(events[0].detail, "SUBMITTED");
}

#[test]
fn test_submit_from_in_progress() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    f.manager.begin("tenant-a", &item_id, "alice").unwrap();
    let item = f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    assert_eq!(item.state, WorkItemState::Submitted);
}

#[test]
fn test_submit_by_non_owner_rejected() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    let result = f.manager.submit("tenant-a", &item_id, "mallory", now());
    assert!(matches!(result, Err(WorkError::NotOwner { .. })));
    assert!(f.sink.is_empty());
    assert_eq!(
        f.store.get("tenant-a", &item_id).unwrap().state,
        WorkItemState::Open
    );
}

#[test]
fn test_submit_without_required_evidence_rejected() {
    let f = fixture();
    let item_id = insert_item(&f, true);

    let result = f.manager.submit("tenant-a", &item_id, "alice", now());
    assert!(matches!(result, Err(WorkError::EvidenceRequired { .. })));
    assert!(f.sink.is_empty());
}

#[test]
fn test_submit_with_linked_evidence_allowed() {
    let f = fixture();
    let item_id = insert_item(&f, true);
    link_evidence(&f, &item_id);

    let item = f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    assert_eq!(item.state, WorkItemState::Submitted);
}

#[test]
fn test_submit_resets_severity() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    f.store
        .with_item_mut("tenant-a", &item_id, &f.sink, &mut |item| {
            item.severity = SlaSeverity::Late;
            Ok(Vec::new())
        })
        .unwrap();

    let item = f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    assert_eq!(item.severity, SlaSeverity::Ok);
    assert_eq!(item.severity_changed_at, Some(now()));
}

#[test]
fn test_submit_twice_rejected() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    let result = f.manager.submit("tenant-a", &item_id, "alice", now());
    assert!(matches!(
        result,
        Err(WorkError::TransitionNotAllowed {
            from_state: WorkItemState::Submitted,
            ..
        })
    ));
}

// =============================================================================
// Approve / Return / Reject Tests
// =============================================================================

#[test]
fn test_submit_then_approve_never_passes_through_returned() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    let item = f
        .manager
        .approve("tenant-a", &item_id, "bob", AuthorityRole::Controller, now())
        .unwrap();

    assert_eq!(item.state, WorkItemState::Approved);
    assert_eq!(item.approved_at, Some(now()));
    assert!(item.return_reason.is_none());

    let types: Vec<String> = f.sink.events().into_iter().map(|e| e.event_type).collect();
    assert_eq!(
        types,
        vec![
            EVENT_WORK_ITEM_SUBMITTED.to_string(),
            EVENT_WORK_ITEM_APPROVED.to_string()
        ]
    );
}

#[test]
fn test_approve_requires_submitted_state() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    let result = f
        .manager
        .approve("tenant-a", &item_id, "bob", AuthorityRole::Cfo, now());
    assert!(matches!(result, Err(WorkError::TransitionNotAllowed { .. })));
}

#[test]
fn test_approve_with_insufficient_authority_rejected() {
    let f = fixture();
    let item_id = insert_item(&f, false); // requires Controller

    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    let result = f
        .manager
        .approve("tenant-a", &item_id, "bob", AuthorityRole::Manager, now());
    assert!(matches!(result, Err(WorkError::InsufficientAuthority { .. })));
    assert_eq!(
        f.store.get("tenant-a", &item_id).unwrap().state,
        WorkItemState::Submitted
    );
}

#[test]
fn test_higher_authority_can_approve() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    let item = f
        .manager
        .approve("tenant-a", &item_id, "cfo-user", AuthorityRole::Cfo, now())
        .unwrap();
    assert_eq!(item.state, WorkItemState::Approved);
}

#[test]
fn test_return_requires_designated_approver() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    let result = f
        .manager
        .return_item("tenant-a", &item_id, "mallory", "not yours", now());
    assert!(matches!(result, Err(WorkError::NotApprover { .. })));
}

#[test]
fn test_resubmission_loop() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    let item = f
        .manager
        .return_item("tenant-a", &item_id, "bob", "missing support", now())
        .unwrap();
    assert_eq!(item.state, WorkItemState::Returned);
    assert_eq!(item.return_reason.as_deref(), Some("missing support"));

    f.manager.begin("tenant-a", &item_id, "alice").unwrap();
    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    let item = f
        .manager
        .approve("tenant-a", &item_id, "bob", AuthorityRole::Controller, now())
        .unwrap();
    assert_eq!(item.state, WorkItemState::Approved);
}

#[test]
fn test_reject_is_terminal() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    let item = f
        .manager
        .reject(
            "tenant-a",
            &item_id,
            "bob",
            AuthorityRole::Controller,
            "out of scope",
            now(),
        )
        .unwrap();
    assert_eq!(item.state, WorkItemState::Rejected);
    assert!(item.is_terminal());

    let result = f.manager.begin("tenant-a", &item_id, "alice");
    assert!(matches!(result, Err(WorkError::TransitionNotAllowed { .. })));
}

#[test]
fn test_approved_is_absorbing() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    f.manager
        .approve("tenant-a", &item_id, "bob", AuthorityRole::Controller, now())
        .unwrap();

    assert!(f.manager.submit("tenant-a", &item_id, "alice", now()).is_err());
    assert!(f
        .manager
        .return_item("tenant-a", &item_id, "bob", "too late", now())
        .is_err());
}

// =============================================================================
// Store Tests
// =============================================================================

#[test]
fn test_insert_duplicate_id_rejected() {
    let f = fixture();
    let item = new_item(false).into_item("tenant-a", now());
    f.store.insert(item.clone()).unwrap();
    assert!(matches!(
        f.store.insert(item),
        Err(WorkError::ItemAlreadyExists { .. })
    ));
}

#[test]
fn test_get_missing_item() {
    let f = fixture();
    assert!(matches!(
        f.store.get("tenant-a", "nope"),
        Err(WorkError::ItemNotFound { .. })
    ));
}

#[test]
fn test_failed_mutation_leaves_item_untouched_and_silent() {
    let f = fixture();
    let item_id = insert_item(&f, false);

    let result = f
        .store
        .with_item_mut("tenant-a", &item_id, &f.sink, &mut |item| {
            item.state = WorkItemState::Done;
            Err(WorkError::Storage {
                message: "backend unavailable".to_string(),
            })
        });

    assert!(matches!(result, Err(WorkError::Storage { .. })));
    assert_eq!(
        f.store.get("tenant-a", &item_id).unwrap().state,
        WorkItemState::Open
    );
    assert!(f.sink.is_empty());
}

#[test]
fn test_list_by_run_and_clock_evaluated() {
    let f = fixture();
    let item_id = insert_item(&f, false);
    let standalone = NewWorkItem {
        run_id: None,
        ..new_item(false)
    }
    .into_item("tenant-a", now());
    f.store.insert(standalone).unwrap();

    assert_eq!(f.store.list("tenant-a").len(), 2);
    assert_eq!(f.store.list_by_run("tenant-a", "run-1").len(), 1);
    assert_eq!(f.store.list_clock_evaluated("tenant-a").len(), 2);

    f.manager.submit("tenant-a", &item_id, "alice", now()).unwrap();
    assert_eq!(f.store.list_clock_evaluated("tenant-a").len(), 1);
}

// =============================================================================
// Parsing Tests
// =============================================================================

#[test]
fn test_state_and_kind_roundtrip() {
    for state in [
        WorkItemState::Open,
        WorkItemState::InProgress,
        WorkItemState::Submitted,
        WorkItemState::Approved,
        WorkItemState::Returned,
        WorkItemState::Rejected,
        WorkItemState::Done,
    ] {
        assert_eq!(WorkItemState::parse(state.as_str()).unwrap(), state);
    }
    for kind in [
        WorkItemKind::CloseTask,
        WorkItemKind::AttestTask,
        WorkItemKind::ControlRun,
        WorkItemKind::TestPlan,
    ] {
        assert_eq!(WorkItemKind::parse(kind.as_str()).unwrap(), kind);
    }
    assert!(WorkItemState::parse("SLEEPING").is_err());
    assert!(WorkItemKind::parse("CHORE").is_err());
}

#[test]
fn test_authority_order() {
    assert!(AuthorityRole::Manager < AuthorityRole::Controller);
    assert!(AuthorityRole::Controller < AuthorityRole::Cfo);
    assert_eq!(AuthorityRole::parse("cfo").unwrap(), AuthorityRole::Cfo);
    assert!(AuthorityRole::parse("INTERN").is_err());
}
