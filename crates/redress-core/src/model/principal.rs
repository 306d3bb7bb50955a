//! Principals: the humans (and service accounts) acting on issues.
//!
//! Every engine operation takes an explicit [`Principal`] value. There is
//! no ambient "current user"; whoever calls the engine has already
//! authenticated the caller and resolved them to one of these records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::model::ids::PrincipalId;

/// Role of a principal, as provisioned in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Reporter,
    Agent,
    Manager,
    Admin,
    SecurityAdmin,
}

impl Role {
    pub const ALL: [Self; 5] = [
        Self::Reporter,
        Self::Agent,
        Self::Manager,
        Self::Admin,
        Self::SecurityAdmin,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reporter => "reporter",
            Self::Agent => "agent",
            Self::Manager => "manager",
            Self::Admin => "admin",
            Self::SecurityAdmin => "security_admin",
        }
    }

    /// Whether this role is staff (works issues rather than filing them).
    #[must_use]
    pub const fn is_staff(self) -> bool {
        !matches!(self, Self::Reporter)
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reporter" => Ok(Self::Reporter),
            "agent" => Ok(Self::Agent),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            "security_admin" | "security-admin" => Ok(Self::SecurityAdmin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An authenticated caller.
///
/// `restricted` is the directory's own flag for the principal; the policy
/// file can restrict further by email, see
/// [`crate::access::permission::PermissionModel::is_restricted`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub restricted: bool,
}

impl Principal {
    pub fn new(id: impl Into<PrincipalId>, email: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            role,
            restricted: false,
        }
    }

    /// Mark the principal as restricted by the directory.
    #[must_use]
    pub const fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }
}
