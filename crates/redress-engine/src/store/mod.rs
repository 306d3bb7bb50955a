//! Storage seam: versioned issue records, append-only comments and audit.
//!
//! # Design
//!
//! Issue rows carry a version stamp and [`IssueStore::update`] is
//! compare-and-swap on it; the service layer retries around
//! [`StoreError::VersionMismatch`]. Comments and audit entries are
//! append-only and need no versioning. The audit append assigns the chain
//! position inside the store so two racing writers can never fork an
//! issue's chain.

pub mod memory;
pub mod sqlite;

use redress_core::audit::{AuditDraft, AuditEntry};
use redress_core::model::{Comment, Issue, IssueId};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A record together with the version stamp it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

/// Failures surfaced by a store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The caller's version stamp is stale; reload and retry.
    #[error("version mismatch for {id}: expected {expected}, found {found}")]
    VersionMismatch {
        id: String,
        expected: u64,
        found: u64,
    },

    /// A record that must exist does not.
    #[error("record not found: {id}")]
    Missing { id: String },

    /// A record that must not exist already does.
    #[error("record already exists: {id}")]
    Duplicate { id: String },

    /// Anything else the backend reports.
    #[error("storage backend failure: {0}")]
    Backend(#[from] anyhow::Error),
}

impl From<StoreError> for redress_core::EngineError {
    fn from(err: StoreError) -> Self {
        Self::Storage {
            reason: err.to_string(),
        }
    }
}

/// Versioned issue records.
pub trait IssueStore: Send + Sync {
    /// Insert a new issue at version 1.
    ///
    /// # Errors
    ///
    /// [`StoreError::Duplicate`] when the id is already taken.
    fn create(&self, issue: &Issue) -> Result<(), StoreError>;

    /// Load an issue with its current version, or `None`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on backend failure.
    fn load(&self, id: &IssueId) -> Result<Option<Versioned<Issue>>, StoreError>;

    /// Replace an issue if its stored version still equals `expected`.
    /// Returns the new version on success.
    ///
    /// # Errors
    ///
    /// [`StoreError::VersionMismatch`] when a concurrent writer got there
    /// first, [`StoreError::Missing`] when the issue vanished.
    fn update(&self, expected: u64, issue: &Issue) -> Result<u64, StoreError>;

    /// All issues, for workload reconstruction at startup.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on backend failure.
    fn all(&self) -> Result<Vec<Versioned<Issue>>, StoreError>;
}

/// Append-only comment feeds.
pub trait CommentStore: Send + Sync {
    /// Append a comment.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on backend failure.
    fn append_comment(&self, comment: &Comment) -> Result<(), StoreError>;

    /// All comments for an issue, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on backend failure.
    fn comments_for(&self, id: &IssueId) -> Result<Vec<Comment>, StoreError>;
}

/// Append-only, hash-chained audit log.
pub trait AuditStore: Send + Sync {
    /// Seal the draft onto the end of its issue's chain and persist it.
    /// Sequence number and chain linkage are assigned atomically in here.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on backend failure.
    fn append_audit(&self, draft: AuditDraft) -> Result<AuditEntry, StoreError>;

    /// Entries for one issue with `seq` greater than `after_seq`, oldest
    /// first, at most `limit`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] on backend failure.
    fn audit_for(
        &self,
        id: &IssueId,
        after_seq: u64,
        limit: usize,
    ) -> Result<Vec<AuditEntry>, StoreError>;
}

/// The full persistence surface the service needs, usually one backend.
pub trait RecordStore: IssueStore + CommentStore + AuditStore {}

impl<T: IssueStore + CommentStore + AuditStore> RecordStore for T {}
