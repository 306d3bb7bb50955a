//! Identifier newtypes.
//!
//! Issues carry a `gr-` prefix and comments a `cm-` prefix so that an id
//! pasted into a log search or a support chat is self-describing. Principal
//! ids come from the upstream directory and are stored verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Number of hex characters kept from the generating UUID.
const SHORT_LEN: usize = 12;

/// Identifier of a grievance issue (`gr-` prefixed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(String);

impl IssueId {
    /// Wrap an existing identifier without further checks.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("gr-{}", short_hex()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a comment (`cm-` prefixed).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommentId(String);

impl CommentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("cm-{}", short_hex()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a principal as issued by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PrincipalId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PrincipalId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Agents are principals; the alias marks assignment-facing signatures.
pub type AgentId = PrincipalId;

fn short_hex() -> String {
    let mut hex = Uuid::new_v4().simple().to_string();
    hex.truncate(SHORT_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_issue_id_has_prefix_and_length() {
        let id = IssueId::generate();
        assert!(id.as_str().starts_with("gr-"));
        assert_eq!(id.as_str().len(), 3 + SHORT_LEN);
    }

    #[test]
    fn test_generated_comment_id_has_prefix() {
        assert!(CommentId::generate().as_str().starts_with("cm-"));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = IssueId::generate();
        let b = IssueId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_ids_serialize_as_bare_strings() {
        let id = IssueId::new("gr-abc123def456");
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, "\"gr-abc123def456\"");
    }
}
