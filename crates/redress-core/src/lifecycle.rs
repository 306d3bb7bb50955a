//! Issue lifecycle: guarded transitions over the status graph.
//!
//! [`Status::can_transition_to`] answers whether an edge exists;
//! [`transition`] additionally enforces who may take it and applies the
//! timestamp effects. All callers that mutate status go through here, so
//! the timestamp rules live in exactly one place.
//!
//! # Usage
//!
//! ```
//! use redress_core::lifecycle;
//! use redress_core::model::{Issue, IssueCategory, IssueDraft, IssueId, Principal, PrincipalId, Priority, Role, Status};
//! use redress_core::policy::EnginePolicy;
//! use chrono::Utc;
//!
//! let manager = Principal::new("mgr-1", "mgr@example.com", Role::Manager);
//! let draft = IssueDraft {
//!     category: IssueCategory::new("it", "laptop"),
//!     subject: "Broken hinge".into(),
//!     detail: String::new(),
//!     priority: Priority::Low,
//! };
//! let issue = Issue::file(IssueId::generate(), draft, PrincipalId::from("emp-9"), Utc::now());
//! let outcome = lifecycle::transition(
//!     &issue,
//!     Status::InProgress,
//!     &manager,
//!     None,
//!     Utc::now(),
//!     &EnginePolicy::default(),
//! ).unwrap();
//! assert!(outcome.issue.first_response_at.is_some());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::access::permission::{Capability, role_grants};
use crate::error::EngineError;
use crate::model::ids::PrincipalId;
use crate::model::issue::{Issue, Status};
use crate::model::principal::Principal;
use crate::policy::EnginePolicy;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// What happened, for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: Status,
    pub to: Status,
    pub actor: PrincipalId,
    pub at: DateTime<Utc>,
    /// Resolution note or reopen reason, where the edge demands one.
    pub note: Option<String>,
}

/// A successfully applied transition.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub issue: Issue,
    pub record: TransitionRecord,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Apply a status transition, returning the mutated issue and its record.
///
/// The input issue is not modified; persistence happens upstream under
/// optimistic concurrency, so this stays a pure function of its inputs.
///
/// Guards:
/// - the edge must exist in the status graph;
/// - the actor must hold `manage:issues` or be the current assignee
///   (a reopen additionally admits the issue's reporter);
/// - entering `resolved` or `closed` requires a non-empty note, and a
///   reopen a non-empty reason;
/// - a reopen must land inside the issue's reopen window.
///
/// Effects:
/// - the first move into `in_progress` latches `first_response_at`;
/// - entering a terminal state stamps it, stores the note, and opens a
///   fresh reopen window of `policy.reopen_window()`;
/// - a reopen clears the terminal stamps, the note, and the window.
///
/// # Errors
///
/// [`EngineError::InvalidTransition`], [`EngineError::PermissionDenied`],
/// [`EngineError::Validation`], or [`EngineError::ReopenWindowExpired`]
/// per the guards above.
pub fn transition(
    issue: &Issue,
    to: Status,
    actor: &Principal,
    note: Option<&str>,
    now: DateTime<Utc>,
    policy: &EnginePolicy,
) -> Result<TransitionOutcome, EngineError> {
    issue.status.can_transition_to(to)?;
    authorize(actor, issue, to)?;

    let note = note
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(ToString::to_string);
    match to {
        Status::Resolved | Status::Closed if note.is_none() => {
            return Err(EngineError::validation(format!(
                "a resolution note is required to mark an issue {to}"
            )));
        }
        Status::Open if note.is_none() => {
            return Err(EngineError::validation("a reopen reason is required"));
        }
        Status::Open => check_reopen_window(issue, now)?,
        _ => {}
    }

    let mut next = issue.clone();
    next.status = to;
    match to {
        Status::InProgress => {
            if next.first_response_at.is_none() {
                next.first_response_at = Some(now);
            }
        }
        Status::Resolved => {
            next.resolved_at = Some(now);
            next.reopenable_until = Some(now + policy.reopen_window());
            next.resolution_note.clone_from(&note);
        }
        Status::Closed => {
            next.closed_at = Some(now);
            next.reopenable_until = Some(now + policy.reopen_window());
            next.resolution_note.clone_from(&note);
        }
        Status::Open => {
            next.resolved_at = None;
            next.closed_at = None;
            next.reopenable_until = None;
            next.resolution_note = None;
        }
        Status::Escalated => {}
    }

    Ok(TransitionOutcome {
        issue: next,
        record: TransitionRecord {
            from: issue.status,
            to,
            actor: actor.id.clone(),
            at: now,
            note,
        },
    })
}

/// Reopen a terminal issue inside its grace window.
///
/// Thin wrapper over [`transition`] to `open`; the reason travels as the
/// transition note.
///
/// # Errors
///
/// See [`transition`].
pub fn reopen(
    issue: &Issue,
    actor: &Principal,
    reason: &str,
    now: DateTime<Utc>,
    policy: &EnginePolicy,
) -> Result<TransitionOutcome, EngineError> {
    transition(issue, Status::Open, actor, Some(reason), now, policy)
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn authorize(actor: &Principal, issue: &Issue, to: Status) -> Result<(), EngineError> {
    let manages = role_grants(actor.role).contains(&Capability::ManageIssues);
    let is_assignee = issue.assignee.as_ref() == Some(&actor.id);
    let allowed = if to == Status::Open {
        // Reopening is also the reporter's recourse.
        manages || is_assignee || actor.id == issue.reporter
    } else {
        manages || is_assignee
    };
    if allowed {
        Ok(())
    } else {
        Err(EngineError::PermissionDenied {
            action: if to == Status::Open {
                "issue.reopen"
            } else {
                "issue.transition"
            },
        })
    }
}

fn check_reopen_window(issue: &Issue, now: DateTime<Utc>) -> Result<(), EngineError> {
    match issue.reopenable_until {
        Some(until) if now <= until => Ok(()),
        Some(until) => Err(EngineError::ReopenWindowExpired { expired_at: until }),
        None => Err(EngineError::validation(
            "terminal issue has no reopen window recorded",
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
