//! Audit trail: append-only history of every mutation.
//!
//! Writes are fire-and-forget. The mutation that produced an entry has
//! already committed, so a failing audit append must not unwind it; the
//! failure is logged as [`EngineError::AuditWriteFailure`] and the engine
//! carries on. Reads are cursor-paginated for the review UI.

use std::sync::Arc;
use tracing::{debug, warn};

use redress_core::EngineError;
use redress_core::audit::{AuditDraft, AuditEntry, verify_chain};
use redress_core::model::IssueId;

use crate::store::AuditStore;

/// The engine's view of the audit log.
#[derive(Debug)]
pub struct AuditTrail<S> {
    store: Arc<S>,
}

impl<S: AuditStore> AuditTrail<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append an entry, swallowing failures.
    ///
    /// Best effort by contract: the caller's mutation is already durable,
    /// and a lost audit entry is an operational alarm, not a rollback.
    pub fn record(&self, draft: AuditDraft) {
        let issue = draft.issue_id.clone();
        let action = draft.action;
        match self.store.append_audit(draft) {
            Ok(entry) => {
                debug!(issue = %issue, action = %action, seq = entry.seq, "audit entry appended");
            }
            Err(source) => {
                let failure = EngineError::AuditWriteFailure {
                    reason: source.to_string(),
                };
                warn!(issue = %issue, action = %action, error = %failure, "audit append lost");
            }
        }
    }

    /// One page of an issue's trail: entries after `after_seq`, oldest
    /// first, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] when the backend fails.
    pub fn entries_for(
        &self,
        id: &IssueId,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, EngineError> {
        Ok(self.store.audit_for(id, after_seq, limit)?)
    }

    /// Re-verify an issue's whole chain against its hashes.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Storage`] for backend failures and for a
    /// broken chain; a break means the stored history cannot be trusted.
    pub fn verify(&self, id: &IssueId) -> Result<(), EngineError> {
        let entries = self.store.audit_for(id, 0, usize::MAX)?;
        verify_chain(&entries).map_err(|fault| EngineError::Storage {
            reason: fault.to_string(),
        })
    }
}

impl<S> Clone for AuditTrail<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
