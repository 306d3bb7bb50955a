//! Access control: the capability table and the comment visibility guard.

pub mod permission;
pub mod visibility;

pub use permission::{Capability, PermissionModel, role_grants};
pub use visibility::FeedAccess;
