//! Comments and the dual-channel feed.
//!
//! Every comment lives on exactly one channel. The external channel is the
//! conversation with the reporter; the internal channel is staff-only case
//! notes. Which channels a caller sees is decided by
//! [`crate::access::visibility`], never here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::model::ids::{CommentId, IssueId, PrincipalId};

/// Channel a comment is posted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Visible to the reporter and to staff.
    External,
    /// Staff-only case notes. Never served to reporters.
    Internal,
}

impl Channel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::External => "external",
            Self::Internal => "internal",
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "external" => Ok(Self::External),
            "internal" => Ok(Self::Internal),
            _ => Err(format!("unknown channel: {s}")),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single comment on an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub issue_id: IssueId,
    pub author: PrincipalId,
    pub channel: Channel,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Build a new comment, rejecting blank bodies.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Validation`] when the body is empty after
    /// trimming.
    pub fn compose(
        issue_id: IssueId,
        author: PrincipalId,
        channel: Channel,
        body: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(EngineError::validation("comment body must not be empty"));
        }
        Ok(Self {
            id: CommentId::generate(),
            issue_id,
            author,
            channel,
            body,
            created_at: now,
        })
    }
}

/// The comment feed as served to one caller.
///
/// `internal` is `None` when the caller has no internal-channel access, so
/// serialized feeds cannot leak even an empty internal section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentFeed {
    pub external: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal: Option<Vec<Comment>>,
}

impl CommentFeed {
    /// Split raw comments into the view allowed for the caller.
    #[must_use]
    pub fn assemble(comments: Vec<Comment>, include_internal: bool) -> Self {
        let mut external = Vec::new();
        let mut internal = Vec::new();
        for comment in comments {
            match comment.channel {
                Channel::External => external.push(comment),
                Channel::Internal => internal.push(comment),
            }
        }
        Self {
            external,
            internal: include_internal.then_some(internal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    fn comment(channel: Channel, body: &str) -> Comment {
        Comment::compose(
            IssueId::new("gr-aaaaaaaaaaaa"),
            PrincipalId::from("agt-1"),
            channel,
            body,
            at(9),
        )
        .expect("compose")
    }

    #[test]
    fn test_compose_rejects_blank_body() {
        let err = Comment::compose(
            IssueId::new("gr-aaaaaaaaaaaa"),
            PrincipalId::from("agt-1"),
            Channel::External,
            "  \n ",
            at(9),
        )
        .expect_err("blank body");
        assert!(matches!(err, EngineError::Validation { .. }));
    }

    #[test]
    fn test_assemble_splits_by_channel() {
        let comments = vec![
            comment(Channel::External, "any update?"),
            comment(Channel::Internal, "payroll export attached"),
            comment(Channel::External, "checking now"),
        ];
        let feed = CommentFeed::assemble(comments, true);
        assert_eq!(feed.external.len(), 2);
        assert_eq!(feed.internal.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_assemble_without_internal_access_omits_channel_entirely() {
        let comments = vec![
            comment(Channel::External, "any update?"),
            comment(Channel::Internal, "payroll export attached"),
        ];
        let feed = CommentFeed::assemble(comments, false);
        assert_eq!(feed.external.len(), 1);
        assert!(feed.internal.is_none());

        let json = serde_json::to_string(&feed).expect("serialize");
        assert!(!json.contains("internal"));
    }
}
