//! Issue model: priority, status graph, and the issue record itself.
//!
//! The status graph is the single source of truth for which lifecycle
//! moves exist. Guard conditions (who may move, notes, reopen windows)
//! live in [`crate::lifecycle`]; this module only answers whether an edge
//! exists at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::model::ids::{AgentId, IssueId, PrincipalId};

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Priority of an issue. Ordering is severity order: `Low < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// The ceiling of the escalation ladder.
    pub const MAX: Self = Self::Critical;

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Whether escalation can raise this priority any further.
    #[must_use]
    pub const fn is_max(self) -> bool {
        matches!(self, Self::Critical)
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("unknown priority: {s}")),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of an issue.
///
/// `Escalated` is a transient holding state: the issue has been flagged for
/// priority elevation and rerouting, and returns to `InProgress` once the
/// responsible agent acts on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Open,
    InProgress,
    Resolved,
    Closed,
    Escalated,
}

impl Status {
    pub const ALL: [Self; 5] = [
        Self::Open,
        Self::InProgress,
        Self::Resolved,
        Self::Closed,
        Self::Escalated,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
            Self::Escalated => "escalated",
        }
    }

    /// Whether the issue has reached an end state of the lifecycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }

    /// Whether the issue occupies a slot of its assignee's workload.
    #[must_use]
    pub const fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Check whether the lifecycle graph contains an edge to `target`.
    ///
    /// Self-transitions are never edges. Edges back to `Open` exist only
    /// from the terminal states and are subject to the reopen window,
    /// which is enforced by [`crate::lifecycle::transition`], not here.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTransition`] when no edge exists.
    pub const fn can_transition_to(self, target: Self) -> Result<(), EngineError> {
        let allowed = matches!(
            (self, target),
            (
                Self::Open,
                Self::InProgress | Self::Resolved | Self::Closed | Self::Escalated
            ) | (Self::InProgress, Self::Resolved | Self::Closed | Self::Escalated)
                | (Self::Escalated, Self::InProgress | Self::Closed)
                | (Self::Resolved, Self::Closed | Self::Open)
                | (Self::Closed, Self::Open)
        );
        if allowed {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: self,
                to: target,
            })
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "in_progress" | "in-progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            "escalated" => Ok(Self::Escalated),
            _ => Err(format!("unknown status: {s}")),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Two-level classification of a grievance, taken from the intake taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCategory {
    pub type_id: String,
    pub sub_type_id: String,
}

impl IssueCategory {
    pub fn new(type_id: impl Into<String>, sub_type_id: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            sub_type_id: sub_type_id.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

/// Fields supplied by the reporter when filing a new issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueDraft {
    pub category: IssueCategory,
    pub subject: String,
    pub detail: String,
    pub priority: Priority,
}

impl IssueDraft {
    /// Validate reporter-supplied fields.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] for an empty subject or blank
    /// category component.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.subject.trim().is_empty() {
            return Err(EngineError::validation("subject must not be empty"));
        }
        if self.category.type_id.trim().is_empty() || self.category.sub_type_id.trim().is_empty() {
            return Err(EngineError::validation(
                "category type and sub-type must both be set",
            ));
        }
        Ok(())
    }
}

/// A grievance issue.
///
/// Timestamps are facts about the history of the record. They are written
/// once by lifecycle operations and cleared only by reopen; nothing else
/// may touch them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub category: IssueCategory,
    pub subject: String,
    pub detail: String,
    pub priority: Priority,
    pub status: Status,
    pub reporter: PrincipalId,
    #[serde(default)]
    pub assignee: Option<AgentId>,
    /// Number of times this issue has been escalated.
    #[serde(default)]
    pub escalation_level: u32,
    pub created_at: DateTime<Utc>,
    /// When the current assignee took the issue on.
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
    /// First moment a staff member moved the issue out of `open`.
    /// Latched: survives later transitions and reopens.
    #[serde(default)]
    pub first_response_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// End of the reopen grace window; set on entering a terminal state.
    #[serde(default)]
    pub reopenable_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub resolution_note: Option<String>,
}

impl Issue {
    /// Build a freshly filed issue in `open` status.
    #[must_use]
    pub fn file(id: IssueId, draft: IssueDraft, reporter: PrincipalId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            category: draft.category,
            subject: draft.subject,
            detail: draft.detail,
            priority: draft.priority,
            status: Status::Open,
            reporter,
            assignee: None,
            escalation_level: 0,
            created_at: now,
            assigned_at: None,
            first_response_at: None,
            resolved_at: None,
            closed_at: None,
            reopenable_until: None,
            resolution_note: None,
        }
    }

    /// The instant the issue reached its current terminal state, if any.
    #[must_use]
    pub fn terminal_at(&self) -> Option<DateTime<Utc>> {
        if self.status.is_terminal() {
            self.resolved_at.or(self.closed_at)
        } else {
            None
        }
    }

    /// Cross-field invariants that must hold after every mutation.
    ///
    /// Returns one short description per violated rule; an empty vector
    /// means the record is internally consistent.
    #[must_use]
    pub fn consistency_violations(&self) -> Vec<&'static str> {
        let mut violations = Vec::new();

        match self.status {
            Status::Open => {
                if self.resolved_at.is_some() || self.closed_at.is_some() {
                    violations.push("open issue carries a terminal timestamp");
                }
                if self.reopenable_until.is_some() {
                    violations.push("open issue carries a reopen window");
                }
                if self.resolution_note.is_some() {
                    violations.push("open issue carries a resolution note");
                }
            }
            Status::InProgress | Status::Escalated => {
                if self.resolved_at.is_some() || self.closed_at.is_some() {
                    violations.push("active issue carries a terminal timestamp");
                }
            }
            Status::Resolved => {
                if self.resolved_at.is_none() {
                    violations.push("resolved issue is missing resolved_at");
                }
                if self.closed_at.is_some() {
                    violations.push("resolved issue carries closed_at");
                }
                if self.reopenable_until.is_none() {
                    violations.push("resolved issue is missing its reopen window");
                }
                if self.resolution_note.is_none() {
                    violations.push("resolved issue is missing its resolution note");
                }
            }
            Status::Closed => {
                if self.closed_at.is_none() {
                    violations.push("closed issue is missing closed_at");
                }
                if self.reopenable_until.is_none() {
                    violations.push("closed issue is missing its reopen window");
                }
                if self.resolution_note.is_none() {
                    violations.push("closed issue is missing its resolution note");
                }
            }
        }

        if self.assignee.is_some() != self.assigned_at.is_some() {
            violations.push("assignee and assigned_at must be set together");
        }

        let ordered = |earlier, later| match (earlier, later) {
            (Some(a), Some(b)) => a <= b,
            _ => true,
        };
        if !ordered(Some(self.created_at), self.first_response_at) {
            violations.push("first response precedes creation");
        }
        if !ordered(Some(self.created_at), self.assigned_at) {
            violations.push("assignment precedes creation");
        }
        if !ordered(self.resolved_at, self.closed_at) {
            violations.push("closure precedes resolution");
        }

        violations
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_issue() -> Issue {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
        Issue::file(
            IssueId::new("gr-aaaaaaaaaaaa"),
            IssueDraft {
                category: IssueCategory::new("payroll", "missing-payment"),
                subject: "June salary not received".to_string(),
                detail: "No deposit as of the 1st".to_string(),
                priority: Priority::High,
            },
            PrincipalId::from("emp-1001"),
            now,
        )
    }

    // -----------------------------------------------------------------------
    // Priority
    // -----------------------------------------------------------------------

    #[test]
    fn test_priority_orders_by_severity() {
        assert!(Priority::Low < Priority::Medium);
        assert!(Priority::Medium < Priority::High);
        assert!(Priority::High < Priority::Critical);
        assert!(Priority::Critical.is_max());
        assert!(!Priority::High.is_max());
    }

    #[test]
    fn test_priority_round_trips_through_str() {
        for p in Priority::ALL {
            assert_eq!(p.as_str().parse::<Priority>().expect("parse"), p);
        }
        assert_eq!(" Critical ".parse::<Priority>().expect("parse"), Priority::Critical);
        assert!("urgent".parse::<Priority>().is_err());
    }

    // -----------------------------------------------------------------------
    // Status graph
    // -----------------------------------------------------------------------

    #[test]
    fn test_allowed_edges() {
        use Status::{Closed, Escalated, InProgress, Open, Resolved};
        let edges = [
            (Open, InProgress),
            (Open, Resolved),
            (Open, Closed),
            (Open, Escalated),
            (InProgress, Resolved),
            (InProgress, Closed),
            (InProgress, Escalated),
            (Escalated, InProgress),
            (Escalated, Closed),
            (Resolved, Closed),
            (Resolved, Open),
            (Closed, Open),
        ];
        for (from, to) in edges {
            assert!(from.can_transition_to(to).is_ok(), "{from} -> {to} should be allowed");
        }
    }

    #[test]
    fn test_denied_edges() {
        use Status::{Closed, Escalated, InProgress, Open, Resolved};
        let denied = [
            (Resolved, InProgress),
            (Resolved, Escalated),
            (Closed, InProgress),
            (Closed, Resolved),
            (Closed, Escalated),
            (Escalated, Open),
            (Escalated, Resolved),
            (InProgress, Open),
        ];
        for (from, to) in denied {
            let err = from.can_transition_to(to).expect_err("edge must not exist");
            assert!(matches!(
                err,
                EngineError::InvalidTransition { from: f, to: t } if f == from && t == to
            ));
        }
    }

    #[test]
    fn test_self_transitions_are_never_edges() {
        for status in Status::ALL {
            assert!(status.can_transition_to(status).is_err());
        }
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&Status::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
        assert_eq!("in-progress".parse::<Status>().expect("parse"), Status::InProgress);
    }

    // -----------------------------------------------------------------------
    // Draft validation
    // -----------------------------------------------------------------------

    #[test]
    fn test_draft_rejects_blank_subject() {
        let draft = IssueDraft {
            category: IssueCategory::new("payroll", "missing-payment"),
            subject: "   ".to_string(),
            detail: String::new(),
            priority: Priority::Medium,
        };
        let err = draft.validate().expect_err("blank subject");
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_draft_rejects_blank_category() {
        let draft = IssueDraft {
            category: IssueCategory::new("payroll", ""),
            subject: "Missing payment".to_string(),
            detail: String::new(),
            priority: Priority::Medium,
        };
        assert!(draft.validate().is_err());
    }

    // -----------------------------------------------------------------------
    // Consistency
    // -----------------------------------------------------------------------

    #[test]
    fn test_fresh_issue_is_consistent() {
        assert!(sample_issue().consistency_violations().is_empty());
    }

    #[test]
    fn test_detects_terminal_timestamp_on_open_issue() {
        let mut issue = sample_issue();
        issue.resolved_at = Some(issue.created_at);
        assert!(!issue.consistency_violations().is_empty());
    }

    #[test]
    fn test_detects_assignee_without_assigned_at() {
        let mut issue = sample_issue();
        issue.assignee = Some(PrincipalId::from("agt-7"));
        assert_eq!(
            issue.consistency_violations(),
            vec!["assignee and assigned_at must be set together"]
        );
    }

    #[test]
    fn test_terminal_at_prefers_resolution_instant() {
        let mut issue = sample_issue();
        assert!(issue.terminal_at().is_none());

        let resolved = issue.created_at + chrono::Duration::hours(3);
        let closed = resolved + chrono::Duration::hours(1);
        issue.status = Status::Closed;
        issue.resolved_at = Some(resolved);
        issue.closed_at = Some(closed);
        issue.reopenable_until = Some(closed + chrono::Duration::days(7));
        issue.resolution_note = Some("paid out".to_string());
        assert_eq!(issue.terminal_at(), Some(resolved));
    }
}
