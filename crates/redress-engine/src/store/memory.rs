//! In-memory store: the default backend for tests and embedded use.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};

use redress_core::audit::{AuditDraft, AuditEntry, CHAIN_ROOT};
use redress_core::model::{Comment, Issue, IssueId};

use super::{AuditStore, CommentStore, IssueStore, StoreError, Versioned};

#[derive(Debug, Default)]
struct AuditLog {
    entries: Vec<AuditEntry>,
    /// Latest entry hash per issue chain.
    heads: HashMap<IssueId, String>,
    next_seq: u64,
}

/// Thread-safe in-memory implementation of all three store traits.
#[derive(Debug, Default)]
pub struct MemoryStore {
    issues: RwLock<HashMap<IssueId, Versioned<Issue>>>,
    comments: RwLock<Vec<Comment>>,
    audit: Mutex<AuditLog>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IssueStore for MemoryStore {
    fn create(&self, issue: &Issue) -> Result<(), StoreError> {
        let mut issues = self.issues.write().expect("issue lock poisoned");
        if issues.contains_key(&issue.id) {
            return Err(StoreError::Duplicate {
                id: issue.id.to_string(),
            });
        }
        issues.insert(
            issue.id.clone(),
            Versioned {
                record: issue.clone(),
                version: 1,
            },
        );
        Ok(())
    }

    fn load(&self, id: &IssueId) -> Result<Option<Versioned<Issue>>, StoreError> {
        let issues = self.issues.read().expect("issue lock poisoned");
        Ok(issues.get(id).cloned())
    }

    fn update(&self, expected: u64, issue: &Issue) -> Result<u64, StoreError> {
        let mut issues = self.issues.write().expect("issue lock poisoned");
        let slot = issues
            .get_mut(&issue.id)
            .ok_or_else(|| StoreError::Missing {
                id: issue.id.to_string(),
            })?;
        if slot.version != expected {
            return Err(StoreError::VersionMismatch {
                id: issue.id.to_string(),
                expected,
                found: slot.version,
            });
        }
        slot.record = issue.clone();
        slot.version += 1;
        Ok(slot.version)
    }

    fn all(&self) -> Result<Vec<Versioned<Issue>>, StoreError> {
        let issues = self.issues.read().expect("issue lock poisoned");
        Ok(issues.values().cloned().collect())
    }
}

impl CommentStore for MemoryStore {
    fn append_comment(&self, comment: &Comment) -> Result<(), StoreError> {
        let mut comments = self.comments.write().expect("comment lock poisoned");
        comments.push(comment.clone());
        Ok(())
    }

    fn comments_for(&self, id: &IssueId) -> Result<Vec<Comment>, StoreError> {
        let comments = self.comments.read().expect("comment lock poisoned");
        Ok(comments
            .iter()
            .filter(|c| &c.issue_id == id)
            .cloned()
            .collect())
    }
}

impl AuditStore for MemoryStore {
    fn append_audit(&self, draft: AuditDraft) -> Result<AuditEntry, StoreError> {
        let mut log = self.audit.lock().expect("audit lock poisoned");
        log.next_seq += 1;
        let seq = log.next_seq;
        let prev = log
            .heads
            .get(&draft.issue_id)
            .cloned()
            .unwrap_or_else(|| CHAIN_ROOT.to_string());
        let entry = draft.seal(seq, &prev);
        log.heads
            .insert(entry.issue_id.clone(), entry.entry_hash.clone());
        log.entries.push(entry.clone());
        Ok(entry)
    }

    fn audit_for(
        &self,
        id: &IssueId,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError> {
        let log = self.audit.lock().expect("audit lock poisoned");
        Ok(log
            .entries
            .iter()
            .filter(|e| &e.issue_id == id && e.seq > after_seq)
            .take(limit)
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
