//! SLA clock: breach flags and turnaround time.
//!
//! Flags are computed from the issue's recorded timestamps, never stored.
//! Because the underlying timestamps are write-once facts, a flag that is
//! true at some instant stays true at every later instant; resolving an
//! issue freezes its clocks instead of clearing them.
//!
//! The assignee-response budget tracks the current assignment episode: it
//! runs from `assigned_at`, and an unassigned issue has no such budget.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::issue::Issue;
use crate::policy::SlaPolicy;

/// Which SLA budgets an issue has blown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreachFlags {
    /// No staff response within the first-response budget.
    pub first_response: bool,
    /// Not resolved within the resolution budget.
    pub resolution: bool,
    /// The current assignee did not act within their response budget.
    pub assignee_response: bool,
}

impl BreachFlags {
    pub const NONE: Self = Self {
        first_response: false,
        resolution: false,
        assignee_response: false,
    };

    #[must_use]
    pub const fn any(self) -> bool {
        self.first_response || self.resolution || self.assignee_response
    }
}

/// Evaluate breach flags for an issue at the given instant.
#[must_use]
pub fn evaluate(issue: &Issue, now: DateTime<Utc>, sla: &SlaPolicy) -> BreachFlags {
    let targets = sla.targets(issue.priority);
    // Terminal issues measure against their terminal instant, so flags
    // freeze instead of drifting as `now` advances.
    let cutoff = issue.terminal_at().unwrap_or(now);

    let first_response = issue.first_response_at.map_or_else(
        || cutoff - issue.created_at > targets.first_response(),
        |responded| responded - issue.created_at > targets.first_response(),
    );

    let resolution = issue.terminal_at().map_or_else(
        || now - issue.created_at > targets.resolution(),
        |done| done - issue.created_at > targets.resolution(),
    );

    let assignee_response = issue.assigned_at.is_some_and(|assigned| {
        match issue.first_response_at {
            // A response that predates this assignment met the budget by
            // inheritance; only responses after assignment are timed.
            Some(responded) if responded >= assigned => {
                responded - assigned > targets.assignee_response()
            }
            Some(_) => false,
            None => cutoff - assigned > targets.assignee_response(),
        }
    });

    BreachFlags {
        first_response,
        resolution,
        assignee_response,
    }
}

/// Turnaround time: creation to terminal instant, or to `now` while live.
#[must_use]
pub fn turnaround(issue: &Issue, now: DateTime<Utc>) -> Duration {
    issue.terminal_at().unwrap_or(now) - issue.created_at
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ids::{IssueId, PrincipalId};
    use crate::model::issue::{IssueCategory, IssueDraft, Priority, Status};
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap()
    }

    fn issue_with_priority(priority: Priority) -> Issue {
        Issue::file(
            IssueId::new("gr-sla000000001"),
            IssueDraft {
                category: IssueCategory::new("hr", "leave"),
                subject: "Leave balance wrong".to_string(),
                detail: String::new(),
                priority,
            },
            PrincipalId::from("emp-3"),
            start(),
        )
    }

    fn sla() -> SlaPolicy {
        SlaPolicy::default()
    }

    // -----------------------------------------------------------------------
    // Live evaluation
    // -----------------------------------------------------------------------

    #[test]
    fn test_fresh_issue_has_no_breaches() {
        let issue = issue_with_priority(Priority::Critical);
        assert_eq!(evaluate(&issue, start(), &sla()), BreachFlags::NONE);
    }

    #[test]
    fn test_first_response_breach_when_budget_elapses() {
        // Critical first response budget is 2 hours.
        let issue = issue_with_priority(Priority::Critical);
        let flags = evaluate(&issue, start() + Duration::hours(3), &sla());
        assert!(flags.first_response);
        assert!(!flags.resolution);
    }

    #[test]
    fn test_budgets_scale_with_priority() {
        // At three hours a critical issue has blown its response budget
        // while a low one (24 hours) has not.
        let now = start() + Duration::hours(3);
        assert!(evaluate(&issue_with_priority(Priority::Critical), now, &sla()).first_response);
        assert!(!evaluate(&issue_with_priority(Priority::Low), now, &sla()).first_response);
    }

    #[test]
    fn test_timely_response_clears_nothing_later() {
        let mut issue = issue_with_priority(Priority::Critical);
        issue.first_response_at = Some(start() + Duration::minutes(30));
        // Days later the response flag still reflects the recorded fact.
        let flags = evaluate(&issue, start() + Duration::days(3), &sla());
        assert!(!flags.first_response);
        assert!(flags.resolution);
    }

    // -----------------------------------------------------------------------
    // Frozen at terminal
    // -----------------------------------------------------------------------

    fn resolved(issue: &Issue, at: DateTime<Utc>) -> Issue {
        let mut done = issue.clone();
        done.status = Status::Resolved;
        done.resolved_at = Some(at);
        done.reopenable_until = Some(at + Duration::days(7));
        done.resolution_note = Some("done".to_string());
        done
    }

    #[test]
    fn test_flags_freeze_at_resolution() {
        let issue = issue_with_priority(Priority::Critical);
        let done = resolved(&issue, start() + Duration::hours(1));
        let at_resolution = evaluate(&done, done.resolved_at.expect("stamped"), &sla());
        let much_later = evaluate(&done, start() + Duration::days(30), &sla());
        assert_eq!(at_resolution, much_later);
        assert_eq!(much_later, BreachFlags::NONE);
    }

    #[test]
    fn test_breach_survives_resolution() {
        // Resolved, but only after the resolution budget (24h) elapsed.
        let issue = issue_with_priority(Priority::Critical);
        let done = resolved(&issue, start() + Duration::hours(30));
        let flags = evaluate(&done, start() + Duration::days(10), &sla());
        assert!(flags.resolution);
        assert!(flags.first_response);
    }

    #[test]
    fn test_flags_are_monotone_as_time_advances() {
        let mut issue = issue_with_priority(Priority::High);
        issue.assigned_at = Some(start() + Duration::minutes(10));
        issue.assignee = Some(PrincipalId::from("agt-2"));

        let mut previous = BreachFlags::NONE;
        for hours in 0..96 {
            let flags = evaluate(&issue, start() + Duration::hours(hours), &sla());
            assert!(!previous.first_response || flags.first_response);
            assert!(!previous.resolution || flags.resolution);
            assert!(!previous.assignee_response || flags.assignee_response);
            previous = flags;
        }
        assert!(previous.any());
    }

    // -----------------------------------------------------------------------
    // Assignee budget
    // -----------------------------------------------------------------------

    #[test]
    fn test_assignee_budget_runs_from_assignment() {
        // High assignee budget is 2 hours; assigned an hour in.
        let mut issue = issue_with_priority(Priority::High);
        issue.assignee = Some(PrincipalId::from("agt-2"));
        issue.assigned_at = Some(start() + Duration::hours(1));

        assert!(!evaluate(&issue, start() + Duration::hours(2), &sla()).assignee_response);
        assert!(evaluate(&issue, start() + Duration::hours(4), &sla()).assignee_response);
    }

    #[test]
    fn test_unassigned_issue_has_no_assignee_budget() {
        let issue = issue_with_priority(Priority::High);
        let flags = evaluate(&issue, start() + Duration::days(5), &sla());
        assert!(!flags.assignee_response);
    }

    #[test]
    fn test_response_before_reassignment_meets_budget() {
        let mut issue = issue_with_priority(Priority::High);
        issue.first_response_at = Some(start() + Duration::minutes(20));
        // Reassigned long after the original response.
        issue.assignee = Some(PrincipalId::from("agt-9"));
        issue.assigned_at = Some(start() + Duration::days(1));
        let flags = evaluate(&issue, start() + Duration::days(2), &sla());
        assert!(!flags.assignee_response);
    }

    // -----------------------------------------------------------------------
    // Turnaround
    // -----------------------------------------------------------------------

    #[test]
    fn test_turnaround_live_tracks_now() {
        let issue = issue_with_priority(Priority::Medium);
        assert_eq!(
            turnaround(&issue, start() + Duration::hours(6)),
            Duration::hours(6)
        );
    }

    #[test]
    fn test_turnaround_freezes_at_terminal() {
        let issue = issue_with_priority(Priority::Medium);
        let done = resolved(&issue, start() + Duration::hours(8));
        assert_eq!(
            turnaround(&done, start() + Duration::days(40)),
            Duration::hours(8)
        );
    }
}
