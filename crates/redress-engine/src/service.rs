//! The operation surface: load, guard, mutate, persist, audit, notify.
//!
//! # Design
//!
//! Every mutating operation runs one optimistic loop: read the versioned
//! issue, plan the mutation against the domain rules, and commit it with
//! a compare-and-swap on the version stamp. A lost race releases any
//! workload slots the plan took, re-reads, and re-plans; once the
//! attempts exceed `policy.conflict_retries` the caller gets
//! [`EngineError::Conflict`]. Audit entries and notifications go out
//! after the commit, fire-and-forget, so they can never fail or unwind
//! the operation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use redress_core::EngineError;
use redress_core::access::{Capability, FeedAccess, PermissionModel, visibility};
use redress_core::audit::{AuditAction, AuditDraft, AuditEntry};
use redress_core::lifecycle::{self, TransitionOutcome};
use redress_core::model::{
    AgentId, AgentProfile, AgentWorkload, Channel, Comment, CommentFeed, Issue, IssueDraft,
    IssueId, Principal, PrincipalId, Priority, Role, Status,
};
use redress_core::policy::EnginePolicy;
use redress_core::sla::{self, BreachFlags};

use crate::assign::{AssignmentEngine, AssignmentOutcome};
use crate::audit::AuditTrail;
use crate::clock::{Clock, SystemClock};
use crate::escalate::{EscalationManager, EscalationOutcome, RerouteOutcome};
use crate::notify::{Notification, NotificationDispatcher, NotificationSink, NotifyTarget};
use crate::store::{RecordStore, StoreError, Versioned};
use crate::workload::WorkloadRegistry;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One issue as served to a caller: the record plus SLA breach flags
/// projected at read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueView {
    pub issue: Issue,
    pub sla: BreachFlags,
}

/// The transport-agnostic face of the engine.
///
/// Whatever fronts the service (HTTP handlers, a CLI, a job runner)
/// resolves the caller to a [`Principal`] and calls these operations;
/// nothing here reads ambient identity or wall-clock state directly.
pub struct IssueService<S> {
    store: Arc<S>,
    policy: EnginePolicy,
    permissions: Arc<PermissionModel>,
    registry: Arc<WorkloadRegistry>,
    assignment: AssignmentEngine,
    escalation: EscalationManager,
    audit: AuditTrail<S>,
    notifications: NotificationDispatcher,
    clock: Arc<dyn Clock>,
}

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

impl<S: RecordStore> IssueService<S> {
    /// Wire a service over the given store, driven by the system clock.
    #[must_use]
    pub fn new(store: Arc<S>, policy: EnginePolicy, sink: Arc<dyn NotificationSink>) -> Self {
        Self::with_clock(store, policy, sink, Arc::new(SystemClock))
    }

    /// Like [`IssueService::new`] with an explicit clock, for tests and
    /// deterministic replays.
    #[must_use]
    pub fn with_clock(
        store: Arc<S>,
        policy: EnginePolicy,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let permissions = Arc::new(PermissionModel::with_restricted(
            policy.restricted_emails.iter(),
        ));
        let registry = Arc::new(WorkloadRegistry::new(policy.agent_capacity));
        let assignment = AssignmentEngine::new(Arc::clone(&registry), Arc::clone(&permissions));
        let escalation = EscalationManager::new(assignment.clone(), Arc::clone(&permissions));
        let audit = AuditTrail::new(Arc::clone(&store));
        let notifications = NotificationDispatcher::spawn(sink);
        Self {
            store,
            policy,
            permissions,
            registry,
            assignment,
            escalation,
            audit,
            notifications,
            clock,
        }
    }

    /// The live workload registry backing assignment decisions.
    #[must_use]
    pub fn registry(&self) -> &WorkloadRegistry {
        &self.registry
    }

    /// The permission model, for surface routing (dashboard vs mobile)
    /// by whatever fronts the service.
    #[must_use]
    pub fn permissions(&self) -> &PermissionModel {
        &self.permissions
    }

    /// The audit trail over the backing store.
    #[must_use]
    pub const fn audit(&self) -> &AuditTrail<S> {
        &self.audit
    }

    /// The policy the service was wired with.
    #[must_use]
    pub const fn policy(&self) -> &EnginePolicy {
        &self.policy
    }

    /// Put an agent on the routing roster, or update their profile.
    pub fn register_agent(&self, profile: AgentProfile) {
        self.registry.register(profile);
    }

    /// Flip an agent's availability. Agents may flip their own; anyone
    /// else needs `manage:issues`.
    ///
    /// # Errors
    ///
    /// [`EngineError::PermissionDenied`] for an unauthorized actor,
    /// [`EngineError::NotFound`] for an unrostered agent.
    pub fn set_agent_availability(
        &self,
        actor: &Principal,
        agent: &AgentId,
        available: bool,
    ) -> Result<(), EngineError> {
        if actor.id != *agent {
            self.permissions
                .require(actor, Capability::ManageIssues, "agent.availability")?;
        }
        self.registry.set_available(agent, available)
    }

    /// Recount workload counters from storage, e.g. after a restart.
    /// Call once the roster is registered.
    ///
    /// # Errors
    ///
    /// [`EngineError::Storage`] when the store cannot be read.
    pub fn recover(&self) -> Result<(), EngineError> {
        let issues = self.store.all()?;
        self.registry.rebuild_from(issues.iter().map(|v| &v.record));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

impl<S: RecordStore> IssueService<S> {
    /// File a new issue for the acting reporter.
    ///
    /// # Errors
    ///
    /// [`EngineError::PermissionDenied`] without `file:issues`;
    /// [`EngineError::Validation`] when the draft fails validation.
    pub fn file_issue(
        &self,
        actor: &Principal,
        draft: IssueDraft,
    ) -> Result<IssueView, EngineError> {
        self.permissions
            .require(actor, Capability::FileIssues, "issue.file")?;
        draft.validate()?;
        let now = self.clock.now();
        let issue = Issue::file(IssueId::generate(), draft, actor.id.clone(), now);
        self.store.create(&issue)?;
        debug!(issue = %issue.id, reporter = %actor.id, "issue filed");
        self.audit.record(AuditDraft {
            issue_id: issue.id.clone(),
            actor: actor.id.clone(),
            action: AuditAction::File,
            before: Value::Null,
            after: digest(&issue),
            reason: None,
            recorded_at: now,
        });
        self.notifications.dispatch(Notification {
            target: NotifyTarget::Role(Role::Manager),
            issue: issue.id.clone(),
            kind: AuditAction::File.as_str(),
            message: format!("new {} issue {}: {}", issue.priority, issue.id, issue.subject),
        });
        Ok(self.view(issue))
    }

    /// Load one issue with live SLA flags.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown id;
    /// [`EngineError::PermissionDenied`] unless the caller is the
    /// reporter, the assignee, or a `manage:issues` holder.
    pub fn fetch(&self, actor: &Principal, id: &IssueId) -> Result<IssueView, EngineError> {
        let issue = self.load_issue(id)?;
        if !visibility::can_view(actor, &issue, Channel::External) {
            return Err(EngineError::PermissionDenied {
                action: "issue.view",
            });
        }
        Ok(self.view(issue))
    }

    /// Hand the issue to a named agent.
    ///
    /// # Errors
    ///
    /// See [`AssignmentEngine::assign_manual`], plus
    /// [`EngineError::Conflict`] when concurrent writers exhaust the
    /// retry budget.
    pub fn assign(
        &self,
        actor: &Principal,
        id: &IssueId,
        target: &AgentId,
    ) -> Result<IssueView, EngineError> {
        let issue = self.mutate(actor, id, |issue, now| {
            let outcome = self.assignment.assign_manual(issue, actor, target, now)?;
            Ok(routed_mutation(issue, outcome, AuditAction::Assign))
        })?;
        Ok(self.view(issue))
    }

    /// Route the issue to the least-loaded eligible agent.
    ///
    /// # Errors
    ///
    /// See [`AssignmentEngine::assign_auto`], plus
    /// [`EngineError::Conflict`] on retry exhaustion.
    pub fn auto_assign(&self, actor: &Principal, id: &IssueId) -> Result<IssueView, EngineError> {
        let issue = self.mutate(actor, id, |issue, now| {
            let outcome = self.assignment.assign_auto(issue, actor, now)?;
            Ok(routed_mutation(issue, outcome, AuditAction::Assign))
        })?;
        Ok(self.view(issue))
    }

    /// Take the issue away from its current assignee.
    ///
    /// # Errors
    ///
    /// See [`AssignmentEngine::unassign`], plus [`EngineError::Conflict`]
    /// on retry exhaustion.
    pub fn unassign(&self, actor: &Principal, id: &IssueId) -> Result<IssueView, EngineError> {
        let issue = self.mutate(actor, id, |issue, now| {
            let outcome = self.assignment.unassign(issue, actor)?;
            Ok(routed_mutation(issue, outcome, AuditAction::Unassign))
        })?;
        Ok(self.view(issue))
    }

    /// Move the issue to a new status through the state machine.
    ///
    /// `open` and `escalated` are not reachable here; reopening goes
    /// through [`IssueService::reopen`] and raising severity through
    /// [`IssueService::escalate`].
    ///
    /// # Errors
    ///
    /// See [`lifecycle::transition`], plus [`EngineError::Conflict`] on
    /// retry exhaustion.
    pub fn change_status(
        &self,
        actor: &Principal,
        id: &IssueId,
        to: Status,
        note: Option<&str>,
    ) -> Result<IssueView, EngineError> {
        match to {
            Status::Open => {
                return Err(EngineError::validation(
                    "reopening goes through the reopen operation",
                ));
            }
            Status::Escalated => {
                return Err(EngineError::validation(
                    "raising severity goes through the escalate operation",
                ));
            }
            _ => {}
        }
        let issue = self.mutate(actor, id, |issue, now| {
            let outcome = lifecycle::transition(issue, to, actor, note, now, &self.policy)?;
            Ok(transition_mutation(issue, outcome))
        })?;
        Ok(self.view(issue))
    }

    /// Raise the issue's severity, re-routing if the assignee is no
    /// longer qualified.
    ///
    /// # Errors
    ///
    /// See [`EscalationManager::escalate`], plus [`EngineError::Conflict`]
    /// on retry exhaustion.
    pub fn escalate(
        &self,
        actor: &Principal,
        id: &IssueId,
        new_priority: Priority,
        reason: &str,
    ) -> Result<IssueView, EngineError> {
        let issue = self.mutate(actor, id, |issue, now| {
            let EscalationOutcome {
                issue: next,
                reroute,
                release_on_abort,
                release_on_commit,
                decision,
            } = self
                .escalation
                .escalate(issue, actor, new_priority, reason, now, &self.policy)?;

            let mut after = digest(&next);
            annotate(&mut after, "escalation", decision);
            let mut mutation = Mutation::new(next, AuditAction::Escalate, digest(issue), after);
            mutation.reason = Some(reason.trim().to_string());
            mutation.release_on_abort.extend(release_on_abort);
            mutation.release_on_commit.extend(release_on_commit);

            let manager_message = if reroute == RerouteOutcome::Unassigned {
                format!(
                    "issue {} escalated to {new_priority} and left unassigned, no eligible agent",
                    mutation.issue.id
                )
            } else {
                format!("issue {} escalated to {new_priority}", mutation.issue.id)
            };
            mutation.notifications.push(Notification {
                target: NotifyTarget::Role(Role::Manager),
                issue: mutation.issue.id.clone(),
                kind: AuditAction::Escalate.as_str(),
                message: manager_message,
            });
            if let RerouteOutcome::Reassigned { to } = &reroute {
                mutation.notifications.push(Notification {
                    target: NotifyTarget::Principal(to.clone()),
                    issue: mutation.issue.id.clone(),
                    kind: AuditAction::Escalate.as_str(),
                    message: format!("escalated issue {} is now yours", mutation.issue.id),
                });
            }
            Ok(mutation)
        })?;
        Ok(self.view(issue))
    }

    /// Reopen a terminal issue inside its grace window. The reason is
    /// mandatory and lands in the audit trail.
    ///
    /// # Errors
    ///
    /// See [`lifecycle::reopen`], plus [`EngineError::Conflict`] on retry
    /// exhaustion.
    pub fn reopen(
        &self,
        actor: &Principal,
        id: &IssueId,
        reason: &str,
    ) -> Result<IssueView, EngineError> {
        let issue = self.mutate(actor, id, |issue, now| {
            let TransitionOutcome { issue: next, record } =
                lifecycle::reopen(issue, actor, reason, now, &self.policy)?;
            let after = digest(&next);
            let mut mutation = Mutation::new(next, AuditAction::Reopen, digest(issue), after);
            mutation.reason = record.note;
            if let Some(agent) = mutation.issue.assignee.clone() {
                mutation.acquire_on_commit.push(agent.clone());
                mutation.notifications.push(Notification {
                    target: NotifyTarget::Principal(agent),
                    issue: mutation.issue.id.clone(),
                    kind: AuditAction::Reopen.as_str(),
                    message: format!("issue {} was reopened", mutation.issue.id),
                });
            }
            Ok(mutation)
        })?;
        Ok(self.view(issue))
    }

    /// Post an external comment: the reporter's own reply path, or the
    /// staff path for the assignee and `manage:issues` holders.
    ///
    /// # Errors
    ///
    /// See [`visibility::ensure_reporter_reply`] and
    /// [`visibility::ensure_can_write`];
    /// [`EngineError::NotFound`] for an unknown issue.
    pub fn add_comment(
        &self,
        actor: &Principal,
        id: &IssueId,
        body: &str,
    ) -> Result<Comment, EngineError> {
        let issue = self.load_issue(id)?;
        if issue.reporter == actor.id {
            visibility::ensure_reporter_reply(actor, &issue)?;
        } else {
            visibility::ensure_can_write(actor, &issue, Channel::External)?;
        }
        let issue = self.settle_escalation(actor, issue)?;
        self.append_comment(actor, &issue, Channel::External, body)
    }

    /// Post an internal note on the staff channel.
    ///
    /// The reporter can never post internally on their own issue,
    /// whatever else they hold.
    ///
    /// # Errors
    ///
    /// See [`visibility::ensure_can_write`]; [`EngineError::NotFound`]
    /// for an unknown issue.
    pub fn add_internal_note(
        &self,
        actor: &Principal,
        id: &IssueId,
        body: &str,
    ) -> Result<Comment, EngineError> {
        let issue = self.load_issue(id)?;
        visibility::ensure_can_write(actor, &issue, Channel::Internal)?;
        let issue = self.settle_escalation(actor, issue)?;
        self.append_comment(actor, &issue, Channel::Internal, body)
    }

    /// The comment feed as the caller is allowed to see it.
    ///
    /// The internal list is absent, not empty, without internal access;
    /// callers with no access at all are refused outright.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotFound`] for an unknown issue;
    /// [`EngineError::PermissionDenied`] for a caller with no view of the
    /// issue.
    pub fn comment_feed(
        &self,
        actor: &Principal,
        id: &IssueId,
    ) -> Result<CommentFeed, EngineError> {
        let issue = self.load_issue(id)?;
        let include_internal = match visibility::feed_access(actor, &issue) {
            FeedAccess::Restricted => {
                return Err(EngineError::PermissionDenied {
                    action: "comment.feed",
                });
            }
            FeedAccess::ExternalOnly => false,
            FeedAccess::Full => true,
        };
        let comments = self.store.comments_for(id)?;
        Ok(CommentFeed::assemble(comments, include_internal))
    }

    /// One page of the issue's audit trail, oldest first.
    ///
    /// # Errors
    ///
    /// [`EngineError::PermissionDenied`] without `view:audit`;
    /// [`EngineError::NotFound`] for an unknown issue.
    pub fn audit_feed(
        &self,
        actor: &Principal,
        id: &IssueId,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, EngineError> {
        self.permissions
            .require(actor, Capability::ViewAudit, "audit.view")?;
        self.load_issue(id)?;
        self.audit.entries_for(id, after_seq, limit)
    }

    /// Re-derive and check the issue's audit hash chain.
    ///
    /// # Errors
    ///
    /// [`EngineError::PermissionDenied`] without `view:audit`;
    /// [`EngineError::Storage`] for a broken chain.
    pub fn verify_audit(&self, actor: &Principal, id: &IssueId) -> Result<(), EngineError> {
        self.permissions
            .require(actor, Capability::ViewAudit, "audit.view")?;
        self.audit.verify(id)
    }

    /// Live workload counters for every rostered agent.
    ///
    /// # Errors
    ///
    /// [`EngineError::PermissionDenied`] without `view:dashboard`.
    pub fn workload_board(&self, actor: &Principal) -> Result<Vec<AgentWorkload>, EngineError> {
        self.permissions
            .require(actor, Capability::ViewDashboard, "dashboard.view")?;
        Ok(self.registry.snapshot())
    }
}

// ---------------------------------------------------------------------------
// Internal mechanics
// ---------------------------------------------------------------------------

/// A planned mutation and the side effects to run around its commit.
struct Mutation {
    issue: Issue,
    action: AuditAction,
    before: Value,
    after: Value,
    reason: Option<String>,
    notifications: Vec<Notification>,
    /// Slots to give back once the update commits, e.g. a replaced
    /// assignee's.
    release_on_commit: Vec<AgentId>,
    /// Slots taken while planning, to give back when the update aborts.
    release_on_abort: Vec<AgentId>,
    /// Slots to take unconditionally once the update commits (reopen).
    acquire_on_commit: Vec<AgentId>,
}

impl Mutation {
    fn new(issue: Issue, action: AuditAction, before: Value, after: Value) -> Self {
        Self {
            issue,
            action,
            before,
            after,
            reason: None,
            notifications: Vec::new(),
            release_on_commit: Vec::new(),
            release_on_abort: Vec::new(),
            acquire_on_commit: Vec::new(),
        }
    }
}

impl<S: RecordStore> IssueService<S> {
    fn view(&self, issue: Issue) -> IssueView {
        let sla = sla::evaluate(&issue, self.clock.now(), &self.policy.sla);
        IssueView { issue, sla }
    }

    fn load_issue(&self, id: &IssueId) -> Result<Issue, EngineError> {
        Ok(self.load_versioned(id)?.record)
    }

    fn load_versioned(&self, id: &IssueId) -> Result<Versioned<Issue>, EngineError> {
        let versioned = self.store.load(id)?;
        versioned.ok_or_else(|| EngineError::not_found("issue", id.as_str()))
    }

    /// An escalated issue returns to `in_progress` the moment its
    /// assignee acts on it. No-op for anyone else or any other status.
    fn settle_escalation(&self, actor: &Principal, issue: Issue) -> Result<Issue, EngineError> {
        if issue.status != Status::Escalated || issue.assignee.as_ref() != Some(&actor.id) {
            return Ok(issue);
        }
        let returned = self.mutate(actor, &issue.id, |record, now| {
            let outcome =
                lifecycle::transition(record, Status::InProgress, actor, None, now, &self.policy)?;
            Ok(transition_mutation(record, outcome))
        });
        match returned {
            Ok(next) => Ok(next),
            // A concurrent writer moved it first; carry on from theirs.
            Err(EngineError::InvalidTransition { .. }) => self.load_issue(&issue.id),
            Err(other) => Err(other),
        }
    }

    fn append_comment(
        &self,
        actor: &Principal,
        issue: &Issue,
        channel: Channel,
        body: &str,
    ) -> Result<Comment, EngineError> {
        let now = self.clock.now();
        let comment = Comment::compose(issue.id.clone(), actor.id.clone(), channel, body, now)?;
        self.store.append_comment(&comment)?;
        let mut after = digest(issue);
        annotate(
            &mut after,
            "comment",
            json!({ "id": comment.id, "channel": channel }),
        );
        self.audit.record(AuditDraft {
            issue_id: issue.id.clone(),
            actor: actor.id.clone(),
            action: AuditAction::Comment,
            before: digest(issue),
            after,
            reason: None,
            recorded_at: now,
        });
        let counterpart = match channel {
            Channel::External => comment_counterpart(actor, issue),
            Channel::Internal => None,
        };
        if let Some(target) = counterpart {
            self.notifications.dispatch(Notification {
                target: NotifyTarget::Principal(target),
                issue: issue.id.clone(),
                kind: AuditAction::Comment.as_str(),
                message: format!("new reply on issue {}", issue.id),
            });
        }
        Ok(comment)
    }

    /// Run one mutation under the optimistic loop.
    fn mutate<F>(&self, actor: &Principal, id: &IssueId, mut plan: F) -> Result<Issue, EngineError>
    where
        F: FnMut(&Issue, DateTime<Utc>) -> Result<Mutation, EngineError>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let now = self.clock.now();
            let Versioned { record, version } = self.load_versioned(id)?;
            let mutation = plan(&record, now)?;
            match self.store.update(version, &mutation.issue) {
                Ok(_) => {
                    for agent in &mutation.release_on_commit {
                        self.registry.release(agent);
                    }
                    for agent in &mutation.acquire_on_commit {
                        self.registry.force_acquire(agent);
                    }
                    self.audit.record(AuditDraft {
                        issue_id: id.clone(),
                        actor: actor.id.clone(),
                        action: mutation.action,
                        before: mutation.before,
                        after: mutation.after,
                        reason: mutation.reason,
                        recorded_at: now,
                    });
                    for notification in mutation.notifications {
                        self.notifications.dispatch(notification);
                    }
                    return Ok(mutation.issue);
                }
                Err(StoreError::VersionMismatch { .. }) => {
                    for agent in &mutation.release_on_abort {
                        self.registry.release(agent);
                    }
                    if attempts > self.policy.conflict_retries {
                        debug!(issue = %id, attempts, "optimistic update exhausted");
                        return Err(EngineError::Conflict { attempts });
                    }
                    debug!(issue = %id, attempt = attempts, "version race, replanning");
                }
                Err(other) => {
                    for agent in &mutation.release_on_abort {
                        self.registry.release(agent);
                    }
                    return Err(other.into());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// The compact state snapshot captured in audit payloads.
fn digest(issue: &Issue) -> Value {
    json!({
        "status": issue.status,
        "priority": issue.priority,
        "assignee": issue.assignee,
        "escalation_level": issue.escalation_level,
    })
}

fn annotate(payload: &mut Value, key: &str, value: Value) {
    if let Value::Object(map) = payload {
        map.insert(key.to_string(), value);
    }
}

fn routed_mutation(before: &Issue, outcome: AssignmentOutcome, action: AuditAction) -> Mutation {
    let AssignmentOutcome {
        issue,
        release_on_abort,
        release_on_commit,
        decision,
    } = outcome;
    let mut after = digest(&issue);
    annotate(&mut after, "routing", decision);
    let mut mutation = Mutation::new(issue, action, digest(before), after);
    mutation.release_on_abort.extend(release_on_abort);
    mutation.release_on_commit.extend(release_on_commit);
    if let Some(agent) = mutation.issue.assignee.clone() {
        mutation.notifications.push(Notification {
            target: NotifyTarget::Principal(agent),
            issue: mutation.issue.id.clone(),
            kind: AuditAction::Assign.as_str(),
            message: format!("issue {} is now assigned to you", mutation.issue.id),
        });
    }
    mutation
}

fn transition_mutation(before: &Issue, outcome: TransitionOutcome) -> Mutation {
    let TransitionOutcome { issue, record } = outcome;
    let after = digest(&issue);
    let mut mutation = Mutation::new(issue, AuditAction::Transition, digest(before), after);
    mutation.reason = record.note;
    // Leaving the active set frees the assignee's slot and tells the
    // reporter; reopening re-enters it through its own operation.
    if before.status.is_active() && !mutation.issue.status.is_active() {
        if let Some(agent) = mutation.issue.assignee.clone() {
            mutation.release_on_commit.push(agent);
        }
        mutation.notifications.push(Notification {
            target: NotifyTarget::Principal(mutation.issue.reporter.clone()),
            issue: mutation.issue.id.clone(),
            kind: AuditAction::Transition.as_str(),
            message: format!("issue {} is now {}", mutation.issue.id, mutation.issue.status),
        });
    }
    mutation
}

fn comment_counterpart(actor: &Principal, issue: &Issue) -> Option<PrincipalId> {
    if issue.reporter == actor.id {
        issue.assignee.clone()
    } else {
        Some(issue.reporter.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
