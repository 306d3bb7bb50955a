#![forbid(unsafe_code)]
//! redress-engine: plumbing around the `redress-core` domain rules.
//!
//! This crate turns the pure rules into a running engine: versioned
//! storage with optimistic concurrency, the live workload registry and
//! assignment routing, escalation handling, the hash-chained audit
//! trail, asynchronous notification dispatch, and the [`IssueService`]
//! facade that front ends call.
//!
//! # Conventions
//!
//! - **Errors**: operations return [`redress_core::EngineError`]; store
//!   internals use [`StoreError`] and convert at the trait boundary.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Time**: the service reads time through the [`Clock`] trait only,
//!   so tests drive it with [`ManualClock`].

pub mod assign;
pub mod audit;
pub mod clock;
pub mod escalate;
pub mod notify;
pub mod principal;
pub mod service;
pub mod store;
pub mod workload;

pub use assign::{AssignmentEngine, AssignmentOutcome};
pub use audit::AuditTrail;
pub use clock::{Clock, ManualClock, SystemClock};
pub use escalate::{EscalationManager, EscalationOutcome, RerouteOutcome};
pub use notify::{
    MemorySink, Notification, NotificationDispatcher, NotificationSink, NotifyTarget, NullSink,
};
pub use principal::{PrincipalResolver, StaticResolver};
pub use service::{IssueService, IssueView};
pub use store::{MemoryStore, RecordStore, SqliteStore, StoreError, Versioned};
pub use workload::WorkloadRegistry;
