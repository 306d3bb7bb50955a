//! Assignment engine: route issues to agents, by hand or by load.
//!
//! # Design
//!
//! Methods here never touch storage. Each returns an [`AssignmentOutcome`]
//! describing the mutated issue plus the workload bookkeeping it implies,
//! and the service layer applies it inside its optimistic update loop. A
//! slot on the target agent is taken from the registry *while planning*
//! (compare-and-swap under the cap for auto-routing), so a burst of
//! concurrent assignments can never oversubscribe an agent; a plan that
//! loses the version race gives the slot back via
//! [`AssignmentOutcome::release_on_abort`].
//!
//! Manual assignment is a management override and skips the capacity cap;
//! the cap gates auto-routing only.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};

use redress_core::EngineError;
use redress_core::access::{Capability, PermissionModel};
use redress_core::model::{AgentId, Issue, Principal};

use crate::workload::WorkloadRegistry;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The planned effects of one assignment decision.
///
/// `issue` carries the new assignee; the caller commits it with a guarded
/// update. `release_on_commit` is honored only after that update lands,
/// `release_on_abort` only when it does not.
#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    /// The issue with the routing decision applied.
    pub issue: Issue,
    /// Slot taken while planning. Give it back if the update aborts.
    pub release_on_abort: Option<AgentId>,
    /// Prior assignee's slot. Give it back once the update commits.
    pub release_on_commit: Option<AgentId>,
    /// Decision evidence for the audit payload: mode, candidate loads at
    /// decision time, and the chosen agent.
    pub decision: Value,
}

/// Routes issues to agents against the live workload registry.
///
/// Validates the actor through the permission model and the target through
/// the roster; holds no issue state of its own.
#[derive(Debug, Clone)]
pub struct AssignmentEngine {
    registry: Arc<WorkloadRegistry>,
    permissions: Arc<PermissionModel>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl AssignmentEngine {
    #[must_use]
    pub const fn new(registry: Arc<WorkloadRegistry>, permissions: Arc<PermissionModel>) -> Self {
        Self {
            registry,
            permissions,
        }
    }

    /// The registry this engine routes against.
    #[must_use]
    pub fn registry(&self) -> &WorkloadRegistry {
        &self.registry
    }

    /// Hand the issue to a named agent.
    ///
    /// The target must be on the roster, available, and cleared for the
    /// issue's priority. Their capacity cap is not consulted; an explicit
    /// management decision may load an agent past it.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PermissionDenied`] unless the actor holds
    ///   `manage:issues`.
    /// - [`EngineError::NotFound`] for a target not on the roster.
    /// - [`EngineError::Validation`] when the issue is not active, the
    ///   target is unavailable or not cleared for the priority, or the
    ///   target already holds the issue.
    pub fn assign_manual(
        &self,
        issue: &Issue,
        actor: &Principal,
        target: &AgentId,
        now: DateTime<Utc>,
    ) -> Result<AssignmentOutcome, EngineError> {
        self.permissions
            .require(actor, Capability::ManageIssues, "issue.assign")?;
        ensure_routable(issue)?;

        let profile = self
            .registry
            .profile(target)
            .ok_or_else(|| EngineError::not_found("agent", target.as_str()))?;
        if !profile.available {
            return Err(EngineError::validation(format!(
                "agent {target} is not available"
            )));
        }
        if profile.priority_ceiling < issue.priority {
            return Err(EngineError::validation(format!(
                "agent {target} is not cleared for {} issues",
                issue.priority
            )));
        }
        if issue.assignee.as_ref() == Some(target) {
            return Err(EngineError::validation(format!(
                "issue is already assigned to {target}"
            )));
        }

        let load_before = self.registry.load(target).unwrap_or_default();
        self.registry.force_acquire(target);

        let mut next = issue.clone();
        next.assignee = Some(target.clone());
        next.assigned_at = Some(now);

        Ok(AssignmentOutcome {
            issue: next,
            release_on_abort: Some(target.clone()),
            release_on_commit: issue.assignee.clone(),
            decision: json!({
                "mode": "manual",
                "chosen": target,
                "candidates": [{ "agent": target, "load": load_before }],
            }),
        })
    }

    /// Route the issue to the least-loaded eligible agent.
    ///
    /// Eligible means available, cleared for the issue's priority, and
    /// under the capacity cap; ties go to the longest-registered agent.
    /// The candidate set and its loads are captured in the decision
    /// evidence before the slot is taken.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PermissionDenied`] unless the actor holds
    ///   `manage:issues`.
    /// - [`EngineError::Validation`] when the issue is not active.
    /// - [`EngineError::NoEligibleAgent`] when no agent qualifies.
    pub fn assign_auto(
        &self,
        issue: &Issue,
        actor: &Principal,
        now: DateTime<Utc>,
    ) -> Result<AssignmentOutcome, EngineError> {
        self.permissions
            .require(actor, Capability::ManageIssues, "issue.assign")?;
        ensure_routable(issue)?;

        let candidates: Vec<Value> = self
            .registry
            .snapshot()
            .into_iter()
            .filter(|row| {
                row.available && row.priority_ceiling >= issue.priority && row.has_headroom()
            })
            .map(|row| json!({ "agent": row.agent, "load": row.current_load }))
            .collect();

        let chosen = self
            .registry
            .acquire_least_loaded(issue.priority)
            .ok_or(EngineError::NoEligibleAgent {
                priority: issue.priority,
            })?;

        let mut next = issue.clone();
        next.assignee = Some(chosen.clone());
        next.assigned_at = Some(now);

        Ok(AssignmentOutcome {
            issue: next,
            release_on_abort: Some(chosen.clone()),
            release_on_commit: issue.assignee.clone(),
            decision: json!({
                "mode": "auto",
                "chosen": chosen,
                "candidates": candidates,
            }),
        })
    }

    /// Take the issue away from its current assignee.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PermissionDenied`] unless the actor holds
    ///   `manage:issues`.
    /// - [`EngineError::Validation`] when the issue is not active or has
    ///   no assignee.
    pub fn unassign(
        &self,
        issue: &Issue,
        actor: &Principal,
    ) -> Result<AssignmentOutcome, EngineError> {
        self.permissions
            .require(actor, Capability::ManageIssues, "issue.unassign")?;
        ensure_routable(issue)?;

        let Some(prior) = issue.assignee.clone() else {
            return Err(EngineError::validation("issue has no assignee"));
        };

        let mut next = issue.clone();
        next.assignee = None;
        next.assigned_at = None;

        Ok(AssignmentOutcome {
            issue: next,
            release_on_abort: None,
            release_on_commit: Some(prior),
            decision: json!({ "mode": "unassign" }),
        })
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn ensure_routable(issue: &Issue) -> Result<(), EngineError> {
    if issue.status.is_active() {
        Ok(())
    } else {
        Err(EngineError::validation(format!(
            "cannot route a {} issue",
            issue.status
        )))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
