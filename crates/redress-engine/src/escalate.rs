//! Escalation: raise an issue's severity and keep it with a qualified agent.
//!
//! # Design
//!
//! Escalation is a strict raise. It bumps the priority and the escalation
//! counter, pushes the status to `escalated` through the state machine,
//! and then checks whether the current assignee is still cleared for the
//! new priority. If not (or if nobody holds the issue) it re-routes
//! through auto-assignment; when that finds no eligible agent either, the
//! issue is left unassigned and loudly flagged rather than parked with an
//! unqualified agent.
//!
//! Like the assignment engine, nothing here touches storage; the outcome
//! is applied by the service layer's optimistic update loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracing::warn;

use redress_core::EngineError;
use redress_core::access::{Capability, PermissionModel};
use redress_core::lifecycle;
use redress_core::model::{AgentId, Issue, Principal, Priority, Status};
use redress_core::policy::EnginePolicy;

use crate::assign::{AssignmentEngine, AssignmentOutcome};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where the issue ended up after an escalation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RerouteOutcome {
    /// The current assignee is cleared for the new priority and keeps it.
    Retained,
    /// The issue moved to an agent cleared for the new priority.
    Reassigned { to: AgentId },
    /// No eligible agent; the issue is unassigned and awaits manual routing.
    Unassigned,
}

impl RerouteOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Retained => "retained",
            Self::Reassigned { .. } => "reassigned",
            Self::Unassigned => "unassigned",
        }
    }
}

/// The planned effects of one escalation.
///
/// Slot bookkeeping mirrors [`AssignmentOutcome`]: `release_on_commit`
/// after the guarded update lands, `release_on_abort` when it does not.
#[derive(Debug, Clone)]
pub struct EscalationOutcome {
    /// The issue with the raise and any re-route applied.
    pub issue: Issue,
    pub reroute: RerouteOutcome,
    pub release_on_abort: Option<AgentId>,
    pub release_on_commit: Option<AgentId>,
    /// Evidence for the audit payload: the raise and the routing decision.
    pub decision: Value,
}

/// Raises issue severity, re-routing when the assignee is outmatched.
#[derive(Debug, Clone)]
pub struct EscalationManager {
    assignment: AssignmentEngine,
    permissions: Arc<PermissionModel>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

impl EscalationManager {
    #[must_use]
    pub const fn new(assignment: AssignmentEngine, permissions: Arc<PermissionModel>) -> Self {
        Self {
            assignment,
            permissions,
        }
    }

    /// Raise the issue to `new_priority`, re-routing if needed.
    ///
    /// A reason is mandatory; it travels into the audit trail. An issue
    /// already at `escalated` status may be raised again without a
    /// further status change.
    ///
    /// # Errors
    ///
    /// - [`EngineError::PermissionDenied`] unless the actor holds
    ///   `manage:issues`.
    /// - [`EngineError::Validation`] for a blank reason or a target
    ///   priority that does not raise the current one.
    /// - [`EngineError::AlreadyMaxPriority`] when the issue is already at
    ///   the top severity.
    /// - [`EngineError::InvalidTransition`] when the issue is in a state
    ///   that cannot escalate, e.g. already resolved.
    pub fn escalate(
        &self,
        issue: &Issue,
        actor: &Principal,
        new_priority: Priority,
        reason: &str,
        now: DateTime<Utc>,
        policy: &EnginePolicy,
    ) -> Result<EscalationOutcome, EngineError> {
        self.permissions
            .require(actor, Capability::ManageIssues, "issue.escalate")?;
        if reason.trim().is_empty() {
            return Err(EngineError::validation("an escalation reason is required"));
        }
        if issue.priority.is_max() {
            return Err(EngineError::AlreadyMaxPriority);
        }
        if new_priority <= issue.priority {
            return Err(EngineError::validation(format!(
                "escalation must raise the priority above {}",
                issue.priority
            )));
        }

        let mut next = if issue.status == Status::Escalated {
            issue.clone()
        } else {
            lifecycle::transition(issue, Status::Escalated, actor, None, now, policy)?.issue
        };
        next.priority = new_priority;
        next.escalation_level += 1;

        let assignee_covers = next.assignee.as_ref().is_some_and(|agent| {
            self.assignment
                .registry()
                .profile(agent)
                .is_some_and(|profile| profile.priority_ceiling >= new_priority)
        });
        if assignee_covers {
            return Ok(EscalationOutcome {
                issue: next,
                reroute: RerouteOutcome::Retained,
                release_on_abort: None,
                release_on_commit: None,
                decision: decision_payload(issue.priority, new_priority, "retained", None),
            });
        }

        match self.assignment.assign_auto(&next, actor, now) {
            Ok(AssignmentOutcome {
                issue: routed,
                release_on_abort,
                release_on_commit,
                decision: routing,
            }) => {
                let reroute = routed.assignee.clone().map_or(
                    RerouteOutcome::Unassigned,
                    |to| RerouteOutcome::Reassigned { to },
                );
                let kind = reroute.as_str();
                Ok(EscalationOutcome {
                    issue: routed,
                    reroute,
                    release_on_abort,
                    release_on_commit,
                    decision: decision_payload(issue.priority, new_priority, kind, Some(routing)),
                })
            }
            Err(EngineError::NoEligibleAgent { .. }) => {
                warn!(
                    issue = %issue.id,
                    priority = %new_priority,
                    "escalated issue left unassigned, no eligible agent"
                );
                let prior = next.assignee.take();
                next.assigned_at = None;
                Ok(EscalationOutcome {
                    issue: next,
                    reroute: RerouteOutcome::Unassigned,
                    release_on_abort: None,
                    release_on_commit: prior,
                    decision: decision_payload(issue.priority, new_priority, "unassigned", None),
                })
            }
            Err(other) => Err(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn decision_payload(
    from: Priority,
    to: Priority,
    reroute: &'static str,
    routing: Option<Value>,
) -> Value {
    let mut payload = json!({
        "from": from,
        "to": to,
        "reroute": reroute,
    });
    if let (Value::Object(map), Some(routing)) = (&mut payload, routing) {
        map.insert("routing".to_string(), routing);
    }
    payload
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use redress_core::model::{
        AgentProfile, IssueCategory, IssueDraft, IssueId, PrincipalId, Role,
    };

    use crate::workload::WorkloadRegistry;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn issue(priority: Priority) -> Issue {
        Issue::file(
            IssueId::new("gr-aaaaaaaaaaaa"),
            IssueDraft {
                category: IssueCategory::new("hr", "payroll"),
                subject: "Payslip missing overtime".into(),
                detail: "March payslip is short 12 hours.".into(),
                priority,
            },
            PrincipalId::new("rep-1"),
            now(),
        )
    }

    fn assigned_issue(priority: Priority, agent: &str) -> Issue {
        let mut issue = issue(priority);
        issue.status = Status::InProgress;
        issue.first_response_at = Some(now());
        issue.assignee = Some(AgentId::new(agent));
        issue.assigned_at = Some(now());
        issue
    }

    fn manager() -> Principal {
        Principal::new("mgr-1", "mgr-1@example.com", Role::Manager)
    }

    fn harness() -> (EscalationManager, Arc<WorkloadRegistry>) {
        let registry = Arc::new(WorkloadRegistry::new(5));
        let permissions = Arc::new(PermissionModel::default());
        let assignment = AssignmentEngine::new(Arc::clone(&registry), Arc::clone(&permissions));
        (EscalationManager::new(assignment, permissions), registry)
    }

    #[test]
    fn test_escalation_raises_priority_level_and_status() {
        let (escalation, registry) = harness();
        registry.register(AgentProfile::new("agt-a", Priority::Critical));
        registry.force_acquire(&AgentId::new("agt-a"));

        let outcome = escalation
            .escalate(
                &assigned_issue(Priority::Medium, "agt-a"),
                &manager(),
                Priority::High,
                "no movement in a week",
                now(),
                &EnginePolicy::default(),
            )
            .expect("escalate");

        assert_eq!(outcome.issue.priority, Priority::High);
        assert_eq!(outcome.issue.status, Status::Escalated);
        assert_eq!(outcome.issue.escalation_level, 1);
        assert_eq!(outcome.reroute, RerouteOutcome::Retained);
        assert_eq!(outcome.decision["reroute"], "retained");
    }

    #[test]
    fn test_escalation_requires_manage_capability() {
        let (escalation, _registry) = harness();
        let agent = Principal::new("agt-a", "agt-a@example.com", Role::Agent);
        let err = escalation
            .escalate(
                &issue(Priority::Medium),
                &agent,
                Priority::High,
                "reason",
                now(),
                &EnginePolicy::default(),
            )
            .expect_err("agents cannot escalate");
        assert!(matches!(err, EngineError::PermissionDenied { .. }));
    }

    #[test]
    fn test_escalation_requires_a_reason() {
        let (escalation, _registry) = harness();
        let err = escalation
            .escalate(
                &issue(Priority::Medium),
                &manager(),
                Priority::High,
                "   ",
                now(),
                &EnginePolicy::default(),
            )
            .expect_err("blank reason");
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_critical_issue_cannot_escalate_further() {
        let (escalation, _registry) = harness();
        let err = escalation
            .escalate(
                &issue(Priority::Critical),
                &manager(),
                Priority::Critical,
                "raise again",
                now(),
                &EnginePolicy::default(),
            )
            .expect_err("already at the top");
        assert!(matches!(err, EngineError::AlreadyMaxPriority));
    }

    #[test]
    fn test_escalation_must_strictly_raise() {
        let (escalation, _registry) = harness();
        for target in [Priority::Low, Priority::Medium] {
            let err = escalation
                .escalate(
                    &issue(Priority::Medium),
                    &manager(),
                    target,
                    "sideways",
                    now(),
                    &EnginePolicy::default(),
                )
                .expect_err("not a raise");
            assert!(matches!(err, EngineError::Validation { .. }));
        }
    }

    #[test]
    fn test_outmatched_assignee_is_rerouted() {
        let (escalation, registry) = harness();
        registry.register(AgentProfile::new("agt-junior", Priority::Medium));
        registry.register(AgentProfile::new("agt-senior", Priority::Critical));
        registry.force_acquire(&AgentId::new("agt-junior"));

        let outcome = escalation
            .escalate(
                &assigned_issue(Priority::Medium, "agt-junior"),
                &manager(),
                Priority::High,
                "needs someone cleared for high",
                now(),
                &EnginePolicy::default(),
            )
            .expect("escalate with reroute");

        assert_eq!(
            outcome.reroute,
            RerouteOutcome::Reassigned {
                to: AgentId::new("agt-senior")
            }
        );
        assert_eq!(outcome.issue.assignee, Some(AgentId::new("agt-senior")));
        assert_eq!(outcome.release_on_commit, Some(AgentId::new("agt-junior")));
        assert_eq!(outcome.release_on_abort, Some(AgentId::new("agt-senior")));
        assert_eq!(outcome.decision["reroute"], "reassigned");
        assert!(outcome.decision["routing"]["candidates"].is_array());
    }

    #[test]
    fn test_unassigned_issue_is_routed_on_escalation() {
        let (escalation, registry) = harness();
        registry.register(AgentProfile::new("agt-senior", Priority::Critical));

        let outcome = escalation
            .escalate(
                &issue(Priority::Medium),
                &manager(),
                Priority::High,
                "nobody picked it up",
                now(),
                &EnginePolicy::default(),
            )
            .expect("escalate unassigned");
        assert_eq!(
            outcome.reroute,
            RerouteOutcome::Reassigned {
                to: AgentId::new("agt-senior")
            }
        );
        assert_eq!(outcome.issue.status, Status::Escalated);
    }

    #[test]
    fn test_failed_reroute_leaves_issue_unassigned() {
        let (escalation, registry) = harness();
        registry.register(AgentProfile::new("agt-junior", Priority::Medium));
        registry.force_acquire(&AgentId::new("agt-junior"));

        let outcome = escalation
            .escalate(
                &assigned_issue(Priority::Medium, "agt-junior"),
                &manager(),
                Priority::Critical,
                "nobody cleared for critical",
                now(),
                &EnginePolicy::default(),
            )
            .expect("escalate without eligible agent");

        assert_eq!(outcome.reroute, RerouteOutcome::Unassigned);
        assert_eq!(outcome.issue.assignee, None);
        assert_eq!(outcome.issue.assigned_at, None);
        assert_eq!(outcome.release_on_commit, Some(AgentId::new("agt-junior")));
        assert_eq!(outcome.decision["reroute"], "unassigned");
    }

    #[test]
    fn test_second_raise_keeps_escalated_status() {
        let (escalation, registry) = harness();
        registry.register(AgentProfile::new("agt-senior", Priority::Critical));
        registry.force_acquire(&AgentId::new("agt-senior"));

        let mut escalated = assigned_issue(Priority::Medium, "agt-senior");
        escalated.status = Status::Escalated;
        escalated.priority = Priority::High;
        escalated.escalation_level = 1;

        let outcome = escalation
            .escalate(
                &escalated,
                &manager(),
                Priority::Critical,
                "still stuck",
                now(),
                &EnginePolicy::default(),
            )
            .expect("second raise");
        assert_eq!(outcome.issue.status, Status::Escalated);
        assert_eq!(outcome.issue.escalation_level, 2);
        assert_eq!(outcome.issue.priority, Priority::Critical);
        assert_eq!(outcome.reroute, RerouteOutcome::Retained);
    }

    #[test]
    fn test_resolved_issue_cannot_escalate() {
        let (escalation, _registry) = harness();
        let mut resolved = issue(Priority::Medium);
        resolved.status = Status::Resolved;
        resolved.resolved_at = Some(now());
        resolved.reopenable_until = Some(now() + chrono::Duration::days(7));
        resolved.resolution_note = Some("fixed".into());

        let err = escalation
            .escalate(
                &resolved,
                &manager(),
                Priority::High,
                "too late",
                now(),
                &EnginePolicy::default(),
            )
            .expect_err("resolved issues stay resolved");
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    proptest! {
        /// Accepted raises strictly increase the priority and bump the level
        /// by exactly one; refused raises change nothing.
        #[test]
        fn prop_priority_and_level_never_regress(
            targets in proptest::collection::vec(0..4usize, 1..12),
        ) {
            let (escalation, registry) = harness();
            registry.register(AgentProfile::new("agt-senior", Priority::Critical));

            let policy = EnginePolicy::default();
            let mut current = issue(Priority::Low);
            let mut accepted = 0u32;
            for target_idx in targets {
                let target = Priority::ALL[target_idx];
                let before = (current.priority, current.escalation_level);
                match escalation.escalate(&current, &manager(), target, "stuck", now(), &policy) {
                    Ok(outcome) => {
                        prop_assert!(outcome.issue.priority > before.0);
                        prop_assert_eq!(outcome.issue.priority, target);
                        prop_assert_eq!(outcome.issue.escalation_level, before.1 + 1);
                        prop_assert_eq!(outcome.issue.status, Status::Escalated);
                        accepted += 1;
                        current = outcome.issue;
                    }
                    Err(EngineError::AlreadyMaxPriority) => {
                        prop_assert_eq!(before.0, Priority::Critical);
                    }
                    Err(EngineError::Validation { .. }) => {
                        prop_assert!(before.0 < Priority::Critical);
                        prop_assert!(target <= before.0);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {other}"),
                }
            }
            prop_assert_eq!(current.escalation_level, accepted);
        }
    }
}
