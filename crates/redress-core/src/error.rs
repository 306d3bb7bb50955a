//! Error taxonomy for the grievance engine.
//!
//! Every fallible operation in the engine resolves to one variant of
//! [`EngineError`]. Callers embedding the engine (HTTP layer, CLI, jobs)
//! match on the variant; machine-readable clients use the stable
//! [`ErrorCode`] instead, which never changes meaning once shipped.
//!
//! # Design
//!
//! - The set of variants is closed. Adapters translate their internal
//!   failures into [`EngineError::Storage`] rather than growing the enum.
//! - [`EngineError::AuditWriteFailure`] is advisory: the engine logs it and
//!   carries on, it never aborts the mutation that produced it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::issue::{Priority, Status};

// ---------------------------------------------------------------------------
// Stable codes
// ---------------------------------------------------------------------------

/// Stable error codes for machine-readable output.
///
/// Codes are grouped by concern:
/// - `1xxx`: input validation and lookup
/// - `2xxx`: access control
/// - `3xxx`: lifecycle rules
/// - `4xxx`: assignment
/// - `5xxx`: persistence and audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Request payload failed validation
    Validation = 1001,
    /// Referenced record does not exist
    NotFound = 1002,
    /// Principal lacks the capability for this action
    PermissionDenied = 2001,
    /// Requested status change is not an allowed edge
    InvalidTransition = 3001,
    /// Reopen attempted after the grace window elapsed
    ReopenWindowExpired = 3002,
    /// Escalation attempted on an issue already at critical priority
    AlreadyMaxPriority = 3003,
    /// Auto-assignment found no agent able to take the issue
    NoEligibleAgent = 4001,
    /// Optimistic write lost every retry attempt
    Conflict = 5001,
    /// Audit trail append failed (advisory, never fatal)
    AuditWriteFailure = 5002,
    /// Backing store rejected or failed an operation
    Storage = 5003,
}

impl ErrorCode {
    /// Numeric code for JSON output.
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    /// Stable string identifier (e.g. "E3001").
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "E1001",
            Self::NotFound => "E1002",
            Self::PermissionDenied => "E2001",
            Self::InvalidTransition => "E3001",
            Self::ReopenWindowExpired => "E3002",
            Self::AlreadyMaxPriority => "E3003",
            Self::NoEligibleAgent => "E4001",
            Self::Conflict => "E5001",
            Self::AuditWriteFailure => "E5002",
            Self::Storage => "E5003",
        }
    }

    /// Human-readable message for this code.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Validation => "Request failed validation",
            Self::NotFound => "Record not found",
            Self::PermissionDenied => "Permission denied",
            Self::InvalidTransition => "Status transition not allowed",
            Self::ReopenWindowExpired => "Reopen window has expired",
            Self::AlreadyMaxPriority => "Issue is already at maximum priority",
            Self::NoEligibleAgent => "No eligible agent for assignment",
            Self::Conflict => "Concurrent update conflict",
            Self::AuditWriteFailure => "Audit trail write failed",
            Self::Storage => "Storage operation failed",
        }
    }

    /// Actionable hint for resolution, where one exists.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::Validation => Some("Check the request fields against the operation contract"),
            Self::NotFound => Some("Verify the identifier and retry"),
            Self::PermissionDenied => {
                Some("The acting principal's role does not grant this capability")
            }
            Self::InvalidTransition => {
                Some("Fetch the current status and pick an allowed target")
            }
            Self::ReopenWindowExpired => Some("File a new issue referencing the closed one"),
            Self::AlreadyMaxPriority => None,
            Self::NoEligibleAgent => {
                Some("All matching agents are unavailable, at capacity, or below the priority ceiling")
            }
            Self::Conflict => Some("Reload the issue and retry the operation"),
            Self::AuditWriteFailure => {
                Some("Check audit store connectivity; the mutation itself committed")
            }
            Self::Storage => Some("Inspect the storage backend logs"),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine error
// ---------------------------------------------------------------------------

/// Closed error type returned by every engine operation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A request field or precondition failed domain validation.
    #[error("validation failed: {reason}")]
    Validation { reason: String },

    /// The referenced record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The acting principal lacks the capability this action requires.
    #[error("permission denied: {action}")]
    PermissionDenied { action: &'static str },

    /// The requested status change is not an edge of the lifecycle graph.
    #[error("invalid transition: {from} -> {to}")]
    InvalidTransition { from: Status, to: Status },

    /// Reopen was attempted after the grace window elapsed.
    #[error("reopen window expired at {expired_at}")]
    ReopenWindowExpired { expired_at: DateTime<Utc> },

    /// Escalation was attempted on an issue already at critical priority.
    #[error("issue is already at maximum priority")]
    AlreadyMaxPriority,

    /// Auto-assignment found no available agent under capacity whose
    /// ceiling covers the issue priority.
    #[error("no eligible agent for {priority} priority")]
    NoEligibleAgent { priority: Priority },

    /// Every optimistic write attempt lost to a concurrent writer.
    #[error("concurrent update conflict after {attempts} attempts")]
    Conflict { attempts: u32 },

    /// The audit trail rejected an append. Advisory only.
    #[error("audit write failed: {reason}")]
    AuditWriteFailure { reason: String },

    /// The backing store failed in a way that is not a version conflict.
    #[error("storage failure: {reason}")]
    Storage { reason: String },
}

impl EngineError {
    /// Build a [`EngineError::Validation`] from any displayable reason.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Build a [`EngineError::NotFound`] for a record kind and id.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::Validation,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::ReopenWindowExpired { .. } => ErrorCode::ReopenWindowExpired,
            Self::AlreadyMaxPriority => ErrorCode::AlreadyMaxPriority,
            Self::NoEligibleAgent { .. } => ErrorCode::NoEligibleAgent,
            Self::Conflict { .. } => ErrorCode::Conflict,
            Self::AuditWriteFailure { .. } => ErrorCode::AuditWriteFailure,
            Self::Storage { .. } => ErrorCode::Storage,
        }
    }

    /// Whether retrying the same request unchanged could succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Storage { .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
