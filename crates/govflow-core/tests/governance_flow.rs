//! End-to-end governance loop: run creation through attestation, with the
//! audit ledger capturing every transition.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use govflow_core::config::GovernanceConfig;
use govflow_core::crypto::Signer;
use govflow_core::error::ErrorKind;
use govflow_core::evidence::{MemoryObjectStore, PiiLevel, RecordMetadata};
use govflow_core::ledger::{Ledger, LedgerEventSink};
use govflow_core::manifest::{BinderFormat, ManifestFilter};
use govflow_core::run::{Period, RunTemplate, TemplateItem};
use govflow_core::service::GovernanceService;
use govflow_core::sla::SlaSeverity;
use govflow_core::work::{
    AuthorityRole, MemoryWorkItemStore, NewWorkItem, WorkItemKind, WorkItemState, WorkItemStore,
};

const CONFIG_TOML: &str = r#"
[clock]
tick_interval_secs = 60

[sla]
grace_hours = 0
escal1_hours = 24
escal2_hours = 48

[[tenants]]
tenant_id = "acme"
"#;

fn close_template() -> RunTemplate {
    RunTemplate {
        name: "month-end-close".to_string(),
        items: vec![
            TemplateItem {
                kind: WorkItemKind::CloseTask,
                code: "REC-CASH".to_string(),
                title: "Cash reconciliation".to_string(),
                owner_id: "alice".to_string(),
                approver_id: "bob".to_string(),
                required_role: AuthorityRole::Controller,
                due_offset_hours: Some(72),
                evidence_required: true,
            },
            TemplateItem {
                kind: WorkItemKind::ControlRun,
                code: "CTRL-ACCESS".to_string(),
                title: "Access review".to_string(),
                owner_id: "carol".to_string(),
                approver_id: "bob".to_string(),
                required_role: AuthorityRole::Manager,
                due_offset_hours: Some(24),
                evidence_required: false,
            },
        ],
    }
}

struct Harness {
    service: GovernanceService,
    objects: MemoryObjectStore,
    ledger: Ledger,
    _tempdir: tempfile::TempDir,
}

fn harness() -> Harness {
    let tempdir = tempfile::tempdir().unwrap();
    let ledger = Ledger::open(tempdir.path().join("audit.db")).unwrap();
    let objects = MemoryObjectStore::new();
    let config = GovernanceConfig::from_toml(CONFIG_TOML).unwrap();

    let service = GovernanceService::new(
        config,
        Arc::new(objects.clone()),
        Arc::new(MemoryWorkItemStore::new()),
        Arc::new(LedgerEventSink::new(ledger.clone())),
    );
    Harness {
        service,
        objects,
        ledger,
        _tempdir: tempdir,
    }
}

fn metadata(item_id: &str, title: &str) -> RecordMetadata {
    RecordMetadata {
        source_kind: "CLOSE_TASK".to_string(),
        source_id: item_id.to_string(),
        title: title.to_string(),
        note: String::new(),
        tags: BTreeSet::new(),
        pii_level: PiiLevel::None,
    }
}

// =============================================================================
// Full Governance Loop
// =============================================================================

#[test]
fn test_full_governance_loop() {
    let h = harness();
    let tenant = "acme";

    // --- Run creation and start -------------------------------------------
    let period = Period::Month {
        year: 2025,
        month: 1,
    };
    let run = h
        .service
        .create_run(tenant, period.clone(), "alice")
        .unwrap();

    let duplicate = h.service.create_run(tenant, period, "bob");
    assert_eq!(duplicate.unwrap_err().kind(), ErrorKind::Conflict);

    h.service
        .start_run(tenant, &run.run_id, &close_template())
        .unwrap();
    let items = h.service.orchestrator().run_items(tenant, &run.run_id);
    assert_eq!(items.len(), 2);

    let cash = items.iter().find(|i| i.code == "REC-CASH").unwrap();

    // --- Evidence gate ----------------------------------------------------
    let premature = h.service.submit_work_item(tenant, &cash.item_id, "alice");
    assert_eq!(premature.unwrap_err().kind(), ErrorKind::Validation);

    let statement = b"January bank statement, all accounts";
    let object = h
        .service
        .upload_evidence(tenant, statement, "application/pdf", None, "alice")
        .unwrap();

    // Identical re-upload deduplicates; the backend is written once.
    let again = h
        .service
        .upload_evidence(tenant, statement, "application/pdf", None, "carol")
        .unwrap();
    assert!(again.deduplicated);
    assert_eq!(again.hash_hex, object.hash_hex);
    assert_eq!(h.objects.write_count(), 1);

    let record = h
        .service
        .create_evidence_record(
            tenant,
            &object.hash_hex,
            metadata(&cash.item_id, "Bank statement"),
            "alice",
        )
        .unwrap();
    h.service
        .link_evidence(tenant, &record.record_id, "CLOSE_TASK", &cash.item_id)
        .unwrap();

    // --- Lifecycle: submit, return, resubmit, approve ---------------------
    h.service
        .submit_work_item(tenant, &cash.item_id, "alice")
        .unwrap();
    h.service
        .return_work_item(tenant, &cash.item_id, "bob", "wrong statement period")
        .unwrap();

    let item = h.service.items().get(tenant, &cash.item_id).unwrap();
    assert_eq!(item.state, WorkItemState::Returned);

    h.service
        .submit_work_item(tenant, &cash.item_id, "alice")
        .unwrap();
    let weak = h
        .service
        .approve_work_item(tenant, &cash.item_id, "bob", AuthorityRole::Manager);
    assert_eq!(weak.unwrap_err().kind(), ErrorKind::Forbidden);

    let approved = h
        .service
        .approve_work_item(tenant, &cash.item_id, "bob", AuthorityRole::Controller)
        .unwrap();
    assert_eq!(approved.state, WorkItemState::Approved);

    // --- Packaging: manifest -> binder -> attestation ---------------------
    let manifest = h
        .service
        .build_manifest(
            tenant,
            "CLOSE_TASK",
            &cash.item_id,
            ManifestFilter::default(),
            "auditor",
        )
        .unwrap();
    assert_eq!(manifest.lines.len(), 1);

    let binder_a = h
        .service
        .build_binder(tenant, &manifest.manifest_id, Some(BinderFormat::Bundle), "auditor")
        .unwrap();
    let binder_b = h
        .service
        .build_binder(tenant, &manifest.manifest_id, Some(BinderFormat::Bundle), "auditor")
        .unwrap();
    assert_eq!(binder_a.checksum_hex, binder_b.checksum_hex);

    let key = Signer::generate();
    let attestation = h
        .service
        .sign_attestation(
            tenant,
            &binder_a.binder_id,
            "bob",
            AuthorityRole::Controller,
            "I certify the January close evidence is complete.",
            &key,
        )
        .unwrap();
    h.service.attestations().verify(&attestation).unwrap();

    // --- Audit ledger -----------------------------------------------------
    h.ledger.verify_chain().unwrap();
    let events = h.ledger.read_from(0, 100).unwrap();
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert!(types.contains(&"run.started"));
    assert!(types.contains(&"work_item.submitted"));
    assert!(types.contains(&"work_item.returned"));
    assert!(types.contains(&"work_item.approved"));
}

// =============================================================================
// SLA Scenarios
// =============================================================================

#[test]
fn test_sla_threshold_scenarios_through_service() {
    let h = harness();
    let tenant = "acme";
    let now = Utc::now();

    let add = |due_offset_hours: i64| {
        h.service
            .add_work_item(
                tenant,
                NewWorkItem {
                    run_id: None,
                    kind: WorkItemKind::ControlRun,
                    code: "CTRL-X".to_string(),
                    title: "Standalone control".to_string(),
                    owner_id: "carol".to_string(),
                    approver_id: "bob".to_string(),
                    required_role: AuthorityRole::Manager,
                    due_at: Some(now + Duration::hours(due_offset_hours)),
                    evidence_required: false,
                },
            )
            .unwrap()
            .item_id
    };

    let late = add(-30);
    let escalated = add(-50);
    let ok = add(5);

    let summary = h.service.tick_sla(tenant).unwrap();
    assert_eq!(summary.evaluated, 3);
    assert_eq!(summary.transitions, 2);

    let items = h.service.items();
    assert_eq!(items.get(tenant, &late).unwrap().severity, SlaSeverity::Late);
    assert_eq!(
        items.get(tenant, &escalated).unwrap().severity,
        SlaSeverity::Escalated
    );
    assert_eq!(items.get(tenant, &ok).unwrap().severity, SlaSeverity::Ok);

    // Immediate re-tick is idempotent.
    let before = h.ledger.stats().unwrap().event_count;
    let summary = h.service.tick_sla(tenant).unwrap();
    assert_eq!(summary.transitions, 0);
    assert_eq!(h.ledger.stats().unwrap().event_count, before);

    h.ledger.verify_chain().unwrap();
}

// =============================================================================
// Period Locks and Integrity Failures
// =============================================================================

#[test]
fn test_locked_period_and_declared_hash_mismatch() {
    let h = harness();
    let tenant = "acme";

    let february = Period::Month {
        year: 2025,
        month: 2,
    };
    h.service.orchestrator().lock_period(tenant, &february);

    let result = h.service.create_run(tenant, february, "alice");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Locked);

    let result = h.service.upload_evidence(
        tenant,
        b"actual content",
        "text/plain",
        Some("abc"),
        "alice",
    );
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Integrity);
    assert_eq!(h.objects.write_count(), 0);

    let result = h
        .service
        .build_binder(tenant, "no-such-manifest", None, "auditor");
    assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
}
