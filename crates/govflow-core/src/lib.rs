//! govflow-core - Governed Workflow Engine
//!
//! The core of a financial-close/compliance platform's governance loop:
//! recurring work items with deadlines, an SLA clock that escalates through
//! severity levels, and an immutable, content-addressed evidence store that
//! proves what was reviewed and when.
//!
//! # Data Flow
//!
//! ```text
//! RunOrchestrator::start_run() --> WorkItems materialized
//!        |
//!        v
//! LifecycleManager::submit/approve (evidence linked via RecordRegistry)
//!        |
//!        v
//! SlaClock::tick() --> severity transitions --> EventSink
//!        |
//!        v  at period close
//! ManifestBuilder --> BinderPackager --> AttestationSigner
//! ```
//!
//! # Modules
//!
//! - [`evidence`]: content-addressed object store, records, and links
//! - [`work`]: work-item state machine and lifecycle manager
//! - [`sla`]: escalation policy, severity clock, and periodic driver
//! - [`run`]: period-scoped run orchestration and templates
//! - [`manifest`]: manifest building, binder packaging, attestation signing
//! - [`ledger`]: append-only, hash-chained audit ledger (`SQLite`)
//! - [`events`]: structured outbound events and sinks
//! - [`crypto`]: Blake3 hashing, hash chains, Ed25519 signing
//! - [`config`]: TOML configuration (policies, cadence, formats)
//! - [`service`]: the assembled facade consumed by API layers
//!
//! # Multi-tenancy
//!
//! Every entity and operation is tenant-scoped. Evidence deduplication,
//! run/period uniqueness, and clock serialization all key on the tenant id;
//! one tenant's clock failure never aborts another's tick.

pub mod config;
pub mod crypto;
pub mod error;
pub mod events;
pub mod evidence;
pub mod ledger;
pub mod manifest;
pub mod run;
pub mod service;
pub mod sla;
pub mod work;

pub use error::{ErrorKind, GovernanceError};
pub use service::GovernanceService;
