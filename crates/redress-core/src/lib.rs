#![forbid(unsafe_code)]
//! redress-core: domain rules of the grievance engine.
//!
//! This crate is pure domain logic: the issue model, the status graph and
//! its guards, capability and visibility rules, SLA arithmetic, audit
//! records, and policy loading. It performs no I/O beyond reading the
//! policy file; storage, routing, and notification live in
//! `redress-engine`.
//!
//! # Conventions
//!
//! - **Errors**: engine-facing functions return [`EngineError`]; loaders
//!   return `anyhow::Result` with context.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Time**: all instants are `chrono::DateTime<Utc>` supplied by the
//!   caller; nothing in this crate reads the wall clock.

pub mod access;
pub mod audit;
pub mod error;
pub mod lifecycle;
pub mod model;
pub mod policy;
pub mod sla;

pub use access::{Capability, FeedAccess, PermissionModel};
pub use error::{EngineError, ErrorCode};
pub use model::{
    AgentId, AgentProfile, AgentWorkload, Channel, Comment, CommentFeed, CommentId, Issue,
    IssueCategory, IssueDraft, IssueId, Principal, PrincipalId, Priority, Role, Status,
};
pub use policy::EnginePolicy;
pub use sla::BreachFlags;
