//! Comment visibility guard.
//!
//! Decides, per caller and channel, what may be read and written on an
//! issue's comment feed. The rules are relationship-based (reporter-of,
//! assignee-of) layered on the static capability table.
//!
//! # Design
//!
//! The reporter check on the internal channel comes first and is absolute:
//! whoever filed the issue never sees its internal notes, whatever their
//! role says. This keeps case notes about a complainant safe even when the
//! complainant is themselves staff.

use crate::access::permission::{Capability, role_grants};
use crate::error::EngineError;
use crate::model::comment::Channel;
use crate::model::issue::{Issue, Status};
use crate::model::principal::Principal;

/// What one caller is allowed to see of an issue's feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedAccess {
    /// No part of the feed is served; callers surface an explicit refusal.
    Restricted,
    /// Only the external conversation is served.
    ExternalOnly,
    /// External conversation plus internal case notes.
    Full,
}

fn manages(principal: &Principal) -> bool {
    role_grants(principal.role).contains(&Capability::ManageIssues)
}

fn is_reporter(principal: &Principal, issue: &Issue) -> bool {
    principal.id == issue.reporter
}

fn is_assignee(principal: &Principal, issue: &Issue) -> bool {
    issue.assignee.as_ref() == Some(&principal.id)
}

/// Whether the principal may read the given channel of this issue.
#[must_use]
pub fn can_view(principal: &Principal, issue: &Issue, channel: Channel) -> bool {
    match channel {
        Channel::External => {
            is_reporter(principal, issue) || is_assignee(principal, issue) || manages(principal)
        }
        Channel::Internal => {
            // Reporter exclusion is absolute and checked first.
            if is_reporter(principal, issue) {
                return false;
            }
            is_assignee(principal, issue) || manages(principal)
        }
    }
}

/// Whether the principal may post on the given channel via the staff path.
///
/// The reporter's own reply path is separate, see [`can_reporter_reply`].
#[must_use]
pub fn can_write(principal: &Principal, issue: &Issue, channel: Channel) -> bool {
    ensure_can_write(principal, issue, channel).is_ok()
}

/// Staff write guard with the reason for refusal.
///
/// # Errors
///
/// - [`EngineError::PermissionDenied`] when the principal is neither the
///   assignee nor a `manage:issues` holder, or is the issue's reporter
///   posting internally.
/// - [`EngineError::Validation`] when the issue is already terminal.
pub fn ensure_can_write(
    principal: &Principal,
    issue: &Issue,
    channel: Channel,
) -> Result<(), EngineError> {
    if channel == Channel::Internal && is_reporter(principal, issue) {
        return Err(EngineError::PermissionDenied {
            action: "comment.internal",
        });
    }
    if !(is_assignee(principal, issue) || manages(principal)) {
        return Err(EngineError::PermissionDenied {
            action: match channel {
                Channel::External => "comment.external",
                Channel::Internal => "comment.internal",
            },
        });
    }
    if issue.status.is_terminal() {
        return Err(EngineError::validation(format!(
            "issue is {}; the conversation is closed",
            issue.status
        )));
    }
    Ok(())
}

/// Whether the reporter may still reply on their own issue.
#[must_use]
pub fn can_reporter_reply(principal: &Principal, issue: &Issue) -> bool {
    ensure_reporter_reply(principal, issue).is_ok()
}

/// Reporter reply guard with the reason for refusal.
///
/// Replies stay open while the issue is `resolved` so a resolution can be
/// contested inside the reopen window; `closed` ends the conversation.
///
/// # Errors
///
/// - [`EngineError::PermissionDenied`] when the caller did not file the
///   issue.
/// - [`EngineError::Validation`] once the issue is closed.
pub fn ensure_reporter_reply(principal: &Principal, issue: &Issue) -> Result<(), EngineError> {
    if !is_reporter(principal, issue) {
        return Err(EngineError::PermissionDenied {
            action: "comment.reply",
        });
    }
    if issue.status == Status::Closed {
        return Err(EngineError::validation(
            "issue is closed; file a new issue referencing it",
        ));
    }
    Ok(())
}

/// Classify the caller's overall feed access for this issue.
#[must_use]
pub fn feed_access(principal: &Principal, issue: &Issue) -> FeedAccess {
    if can_view(principal, issue, Channel::Internal) {
        FeedAccess::Full
    } else if can_view(principal, issue, Channel::External) {
        FeedAccess::ExternalOnly
    } else {
        FeedAccess::Restricted
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
