//! Domain records of the grievance engine.
//!
//! ## Submodules
//!
//! - [`ids`]: prefixed identifier newtypes.
//! - [`issue`]: priority, the status graph, and the issue record.
//! - [`principal`]: authenticated callers and their roles.
//! - [`comment`]: dual-channel comments and the per-caller feed.
//! - [`agent`]: agent routing profiles and workload snapshots.

pub mod agent;
pub mod comment;
pub mod ids;
pub mod issue;
pub mod principal;

pub use agent::{AgentProfile, AgentWorkload};
pub use comment::{Channel, Comment, CommentFeed};
pub use ids::{AgentId, CommentId, IssueId, PrincipalId};
pub use issue::{Issue, IssueCategory, IssueDraft, Priority, Status};
pub use principal::{Principal, Role};
