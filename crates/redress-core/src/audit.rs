//! Audit records and the per-issue hash chain.
//!
//! Each entry hashes its own content plus the previous entry's hash, so a
//! trail read back from storage can be verified end to end: any edited,
//! dropped, or reordered entry breaks the chain at that point.
//!
//! The hash input is canonical: JSON payloads are serialized with sorted
//! keys, fields are tab-joined in a fixed order, and the digest is prefixed
//! with its algorithm (`blake3:<hex>`) so the scheme can be rotated later.

use chrono::{DateTime, Utc};
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::model::ids::{IssueId, PrincipalId};

/// `prev_hash` of the first entry in every issue's chain.
pub const CHAIN_ROOT: &str = "root";

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// What kind of mutation an audit entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    File,
    Assign,
    Unassign,
    Transition,
    Reopen,
    Escalate,
    Comment,
}

impl AuditAction {
    pub const ALL: [Self; 7] = [
        Self::File,
        Self::Assign,
        Self::Unassign,
        Self::Transition,
        Self::Reopen,
        Self::Escalate,
        Self::Comment,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "issue.file",
            Self::Assign => "issue.assign",
            Self::Unassign => "issue.unassign",
            Self::Transition => "issue.transition",
            Self::Reopen => "issue.reopen",
            Self::Escalate => "issue.escalate",
            Self::Comment => "issue.comment",
        }
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issue.file" => Ok(Self::File),
            "issue.assign" => Ok(Self::Assign),
            "issue.unassign" => Ok(Self::Unassign),
            "issue.transition" => Ok(Self::Transition),
            "issue.reopen" => Ok(Self::Reopen),
            "issue.escalate" => Ok(Self::Escalate),
            "issue.comment" => Ok(Self::Comment),
            _ => Err(format!("unknown audit action: {s}")),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AuditAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AuditAction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(DeError::custom)
    }
}

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// An audit entry before the store has placed it in a chain.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub issue_id: IssueId,
    pub actor: PrincipalId,
    pub action: AuditAction,
    /// Relevant fields before the mutation, as a JSON object.
    pub before: Value,
    /// Relevant fields after the mutation, as a JSON object.
    pub after: Value,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditDraft {
    /// Fix the draft into the chain at the given position.
    #[must_use]
    pub fn seal(self, seq: u64, prev_hash: &str) -> AuditEntry {
        let entry_hash = hash_entry(
            &self.issue_id,
            &self.actor,
            self.action,
            &self.before,
            &self.after,
            self.reason.as_deref(),
            self.recorded_at,
            prev_hash,
        );
        AuditEntry {
            seq,
            issue_id: self.issue_id,
            actor: self.actor,
            action: self.action,
            before: self.before,
            after: self.after,
            reason: self.reason,
            recorded_at: self.recorded_at,
            prev_hash: prev_hash.to_string(),
            entry_hash,
        }
    }
}

/// A committed audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Store-assigned position, strictly increasing across all issues.
    pub seq: u64,
    pub issue_id: IssueId,
    pub actor: PrincipalId,
    pub action: AuditAction,
    pub before: Value,
    pub after: Value,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
    /// Hash of the previous entry for this issue, or [`CHAIN_ROOT`].
    pub prev_hash: String,
    pub entry_hash: String,
}

impl AuditEntry {
    /// Recompute this entry's hash from its content.
    #[must_use]
    pub fn expected_hash(&self) -> String {
        hash_entry(
            &self.issue_id,
            &self.actor,
            self.action,
            &self.before,
            &self.after,
            self.reason.as_deref(),
            self.recorded_at,
            &self.prev_hash,
        )
    }
}

/// A break detected while verifying a chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("audit chain fault at seq {seq}: {reason}")]
pub struct ChainFault {
    pub seq: u64,
    pub reason: &'static str,
}

/// Verify one issue's chain as returned by the store, oldest first.
///
/// # Errors
///
/// Returns a [`ChainFault`] naming the first entry whose content hash,
/// root marker, or link to its predecessor does not hold.
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), ChainFault> {
    let mut prev_hash: Option<&str> = None;
    for entry in entries {
        match prev_hash {
            None => {
                if entry.prev_hash != CHAIN_ROOT {
                    return Err(ChainFault {
                        seq: entry.seq,
                        reason: "first entry does not start at the chain root",
                    });
                }
            }
            Some(prev) => {
                if entry.prev_hash != prev {
                    return Err(ChainFault {
                        seq: entry.seq,
                        reason: "entry does not link to its predecessor",
                    });
                }
            }
        }
        if entry.entry_hash != entry.expected_hash() {
            return Err(ChainFault {
                seq: entry.seq,
                reason: "entry content does not match its hash",
            });
        }
        prev_hash = Some(&entry.entry_hash);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

// serde_json maps sort keys, so Value::to_string is canonical here.
#[allow(clippy::too_many_arguments)]
fn hash_entry(
    issue_id: &IssueId,
    actor: &PrincipalId,
    action: AuditAction,
    before: &Value,
    after: &Value,
    reason: Option<&str>,
    recorded_at: DateTime<Utc>,
    prev_hash: &str,
) -> String {
    let input = format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        recorded_at.to_rfc3339(),
        issue_id,
        actor,
        action,
        before,
        after,
        reason.unwrap_or(""),
        prev_hash,
    );
    format!("blake3:{}", blake3::hash(input.as_bytes()).to_hex())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
