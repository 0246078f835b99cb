//! Service facade over the governance engine.
//!
//! [`GovernanceService`] wires the stores, registries, lifecycle manager,
//! orchestrator, clock, and packaging pipeline together and exposes the
//! inbound operations consumed by a surrounding API layer. Tenant and actor
//! ids arrive from the (out-of-scope) authentication layer; this facade
//! enforces the engine's own guards, not authentication.

use std::sync::Arc;

use chrono::Utc;

use crate::config::GovernanceConfig;
use crate::crypto::Signer;
use crate::error::GovernanceError;
use crate::events::{EventSink, MemoryEventSink};
use crate::evidence::{
    EvidenceLink, EvidenceRecord, MemoryObjectStore, ObjectRef, ObjectStore, RecordMetadata,
    RecordRegistry,
};
use crate::manifest::{
    Attestation, AttestationSigner, Binder, BinderFormat, BinderPackager, BinderStore, Manifest,
    ManifestBuilder, ManifestFilter, ManifestStore,
};
use crate::run::{Period, Run, RunOrchestrator, RunTemplate};
use crate::sla::{ClockDriver, SlaClock, TickSummary};
use crate::work::{
    AuthorityRole, LifecycleManager, MemoryWorkItemStore, NewWorkItem, WorkItem, WorkItemStore,
};

/// The assembled governance engine.
pub struct GovernanceService {
    config: GovernanceConfig,
    objects: Arc<dyn ObjectStore>,
    registry: RecordRegistry,
    items: Arc<dyn WorkItemStore>,
    lifecycle: LifecycleManager,
    orchestrator: RunOrchestrator,
    builder: ManifestBuilder,
    packager: BinderPackager,
    attestations: AttestationSigner,
    clock: Arc<SlaClock>,
}

impl GovernanceService {
    /// Assembles a service over the given stores and event sink.
    #[must_use]
    pub fn new(
        config: GovernanceConfig,
        objects: Arc<dyn ObjectStore>,
        items: Arc<dyn WorkItemStore>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let registry = RecordRegistry::new();
        let manifests = ManifestStore::new();
        let binders = BinderStore::new();

        let lifecycle =
            LifecycleManager::new(Arc::clone(&items), registry.clone(), Arc::clone(&sink));
        let orchestrator = RunOrchestrator::new(Arc::clone(&items), Arc::clone(&sink));
        let builder = ManifestBuilder::new(registry.clone(), manifests.clone());
        let packager = BinderPackager::new(manifests, Arc::clone(&objects), binders.clone());
        let attestations = AttestationSigner::new(binders);
        let clock = Arc::new(SlaClock::new(Arc::clone(&items), sink));

        Self {
            config,
            objects,
            registry,
            items,
            lifecycle,
            orchestrator,
            builder,
            packager,
            attestations,
            clock,
        }
    }

    /// Assembles an all-in-memory service (tests, demos, embedding).
    #[must_use]
    pub fn in_memory(config: GovernanceConfig) -> Self {
        Self::new(
            config,
            Arc::new(MemoryObjectStore::new()),
            Arc::new(MemoryWorkItemStore::new()),
            Arc::new(MemoryEventSink::new()),
        )
    }

    // =========================================================================
    // Evidence
    // =========================================================================

    /// Uploads evidence bytes, deduplicating by content hash.
    ///
    /// When `declared_hash_hex` is given, a mismatch against the computed
    /// hash is a hard integrity failure and nothing is persisted.
    ///
    /// # Errors
    ///
    /// Evidence validation and integrity errors.
    pub fn upload_evidence(
        &self,
        tenant_id: &str,
        content: &[u8],
        mime_type: &str,
        declared_hash_hex: Option<&str>,
        actor_id: &str,
    ) -> Result<ObjectRef, GovernanceError> {
        let now = Utc::now();
        let object = match declared_hash_hex {
            Some(declared) => self
                .objects
                .put_declared(tenant_id, content, declared, mime_type, actor_id, now)?,
            None => self.objects.put(tenant_id, content, mime_type, actor_id, now)?,
        };
        Ok(object)
    }

    /// Creates a logical evidence record over an uploaded object.
    ///
    /// # Errors
    ///
    /// `NotFound` when the object is absent; validation errors otherwise.
    pub fn create_evidence_record(
        &self,
        tenant_id: &str,
        object_hash: &str,
        metadata: RecordMetadata,
        actor_id: &str,
    ) -> Result<EvidenceRecord, GovernanceError> {
        let meta = self.objects.meta(tenant_id, object_hash)?;
        let record = self.registry.create_record(
            tenant_id,
            object_hash,
            meta.size,
            metadata,
            actor_id,
            Utc::now(),
        )?;
        Ok(record)
    }

    /// Links an evidence record to a work-item-shaped reference
    /// (idempotent).
    ///
    /// # Errors
    ///
    /// `NotFound` when the record is absent.
    pub fn link_evidence(
        &self,
        tenant_id: &str,
        record_id: &str,
        ref_kind: &str,
        ref_id: &str,
    ) -> Result<EvidenceLink, GovernanceError> {
        let link = self
            .registry
            .link(tenant_id, record_id, ref_kind, ref_id, Utc::now())?;
        Ok(link)
    }

    // =========================================================================
    // Runs and work items
    // =========================================================================

    /// Creates a draft run for a period.
    ///
    /// # Errors
    ///
    /// `Locked` for locked periods (checked first), `Conflict` for
    /// duplicates.
    pub fn create_run(
        &self,
        tenant_id: &str,
        period: Period,
        actor_id: &str,
    ) -> Result<Run, GovernanceError> {
        let run = self
            .orchestrator
            .create_run(tenant_id, period, actor_id, Utc::now())?;
        Ok(run)
    }

    /// Starts a run, materializing the template's work items (idempotent).
    ///
    /// # Errors
    ///
    /// `NotFound` when the run is absent.
    pub fn start_run(
        &self,
        tenant_id: &str,
        run_id: &str,
        template: &RunTemplate,
    ) -> Result<Run, GovernanceError> {
        let run = self
            .orchestrator
            .start_run(tenant_id, run_id, template, Utc::now())?;
        Ok(run)
    }

    /// Adds a standalone work item outside any run.
    ///
    /// # Errors
    ///
    /// Store errors on id collision.
    pub fn add_work_item(
        &self,
        tenant_id: &str,
        new_item: NewWorkItem,
    ) -> Result<WorkItem, GovernanceError> {
        let item = new_item.into_item(tenant_id, Utc::now());
        self.items.insert(item.clone()).map_err(GovernanceError::from)?;
        Ok(item)
    }

    /// Submits a work item for approval.
    ///
    /// # Errors
    ///
    /// Lifecycle guard failures (`Validation`/`Forbidden`).
    pub fn submit_work_item(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor_id: &str,
    ) -> Result<WorkItem, GovernanceError> {
        let item = self
            .lifecycle
            .submit(tenant_id, item_id, actor_id, Utc::now())?;
        Ok(item)
    }

    /// Returns a submitted work item to its owner.
    ///
    /// # Errors
    ///
    /// Lifecycle guard failures (`Validation`/`Forbidden`).
    pub fn return_work_item(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor_id: &str,
        reason: &str,
    ) -> Result<WorkItem, GovernanceError> {
        let item =
            self.lifecycle
                .return_item(tenant_id, item_id, actor_id, reason, Utc::now())?;
        Ok(item)
    }

    /// Approves a submitted work item.
    ///
    /// # Errors
    ///
    /// Lifecycle guard failures (`Validation`/`Forbidden`).
    pub fn approve_work_item(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor_id: &str,
        actor_role: AuthorityRole,
    ) -> Result<WorkItem, GovernanceError> {
        let item = self
            .lifecycle
            .approve(tenant_id, item_id, actor_id, actor_role, Utc::now())?;
        Ok(item)
    }

    /// Terminally rejects a submitted work item.
    ///
    /// # Errors
    ///
    /// Lifecycle guard failures (`Validation`/`Forbidden`).
    pub fn reject_work_item(
        &self,
        tenant_id: &str,
        item_id: &str,
        actor_id: &str,
        actor_role: AuthorityRole,
        reason: &str,
    ) -> Result<WorkItem, GovernanceError> {
        let item = self.lifecycle.reject(
            tenant_id, item_id, actor_id, actor_role, reason,
            Utc::now(),
        )?;
        Ok(item)
    }

    // =========================================================================
    // Packaging
    // =========================================================================

    /// Builds a manifest over the records linked to a scope.
    ///
    /// # Errors
    ///
    /// Filter validation errors.
    pub fn build_manifest(
        &self,
        tenant_id: &str,
        scope_kind: &str,
        scope_id: &str,
        filter: ManifestFilter,
        actor_id: &str,
    ) -> Result<Manifest, GovernanceError> {
        let manifest = self.builder.build(
            tenant_id, scope_kind, scope_id, filter, actor_id,
            Utc::now(),
        )?;
        Ok(manifest)
    }

    /// Packages a binder from a manifest; `format` defaults to the
    /// configured binder format.
    ///
    /// # Errors
    ///
    /// `NotFound` when the manifest is absent; packaging failures.
    pub fn build_binder(
        &self,
        tenant_id: &str,
        manifest_id: &str,
        format: Option<BinderFormat>,
        actor_id: &str,
    ) -> Result<Binder, GovernanceError> {
        let format = format.unwrap_or(self.config.binder.format);
        let binder = self
            .packager
            .build(tenant_id, manifest_id, format, actor_id, Utc::now())?;
        Ok(binder)
    }

    /// Signs an attestation over a binder.
    ///
    /// # Errors
    ///
    /// `NotFound` when the binder is absent; statement validation errors.
    pub fn sign_attestation(
        &self,
        tenant_id: &str,
        binder_id: &str,
        signer_id: &str,
        signer_role: AuthorityRole,
        statement: &str,
        signer: &Signer,
    ) -> Result<Attestation, GovernanceError> {
        let attestation = self.attestations.sign(
            tenant_id,
            binder_id,
            signer_id,
            signer_role,
            statement,
            signer,
            Utc::now(),
        )?;
        Ok(attestation)
    }

    // =========================================================================
    // Clock
    // =========================================================================

    /// Ticks the SLA clock for one tenant using its configured policy.
    ///
    /// # Errors
    ///
    /// Policy validation errors and store failures.
    pub fn tick_sla(&self, tenant_id: &str) -> Result<TickSummary, GovernanceError> {
        let policy = self.config.policy_for(tenant_id);
        let summary = self.clock.tick(tenant_id, &policy, Utc::now())?;
        Ok(summary)
    }

    /// Builds the periodic clock driver from the configured tenant table.
    #[must_use]
    pub fn clock_driver(&self) -> ClockDriver {
        ClockDriver::new(
            Arc::clone(&self.clock),
            self.config.policies(),
            std::time::Duration::from_secs(self.config.clock.tick_interval_secs),
        )
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The evidence object store.
    #[must_use]
    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    /// The evidence record registry.
    #[must_use]
    pub fn registry(&self) -> &RecordRegistry {
        &self.registry
    }

    /// The work-item store.
    #[must_use]
    pub fn items(&self) -> &Arc<dyn WorkItemStore> {
        &self.items
    }

    /// The run orchestrator.
    #[must_use]
    pub fn orchestrator(&self) -> &RunOrchestrator {
        &self.orchestrator
    }

    /// The binder packager.
    #[must_use]
    pub fn packager(&self) -> &BinderPackager {
        &self.packager
    }

    /// The attestation signer.
    #[must_use]
    pub fn attestations(&self) -> &AttestationSigner {
        &self.attestations
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }
}
