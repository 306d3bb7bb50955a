//! Capability grants per role.
//!
//! # Design
//!
//! Capabilities are a closed enum, not free strings: a typo'd capability is
//! a compile error, and the grant table below is exhaustive per role. The
//! table is static; nothing about an individual issue can ever widen or
//! narrow what a role may do. Relationship rules (reporter-of, assignee-of)
//! are separate checks in [`crate::access::visibility`] and
//! [`crate::lifecycle`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::EngineError;
use crate::model::principal::{Principal, Role};

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Discrete actions a role can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Assign, transition, escalate, and otherwise steer issues.
    ManageIssues,
    /// See the staff dashboard (workload board, queues).
    ViewDashboard,
    /// File new issues.
    FileIssues,
    /// Post comments on issues.
    CommentIssues,
    /// See aggregate reports.
    ViewReports,
    /// Read audit trails.
    ViewAudit,
}

impl Capability {
    pub const ALL: [Self; 6] = [
        Self::ManageIssues,
        Self::ViewDashboard,
        Self::FileIssues,
        Self::CommentIssues,
        Self::ViewReports,
        Self::ViewAudit,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ManageIssues => "manage:issues",
            Self::ViewDashboard => "view:dashboard",
            Self::FileIssues => "file:issues",
            Self::CommentIssues => "comment:issues",
            Self::ViewReports => "view:reports",
            Self::ViewAudit => "view:audit",
        }
    }
}

impl FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manage:issues" => Ok(Self::ManageIssues),
            "view:dashboard" => Ok(Self::ViewDashboard),
            "file:issues" => Ok(Self::FileIssues),
            "comment:issues" => Ok(Self::CommentIssues),
            "view:reports" => Ok(Self::ViewReports),
            "view:audit" => Ok(Self::ViewAudit),
            _ => Err(format!("unknown capability: {s}")),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The grants of each role. Exhaustive and deliberately boring.
#[must_use]
pub const fn role_grants(role: Role) -> &'static [Capability] {
    match role {
        Role::Reporter => &[Capability::FileIssues, Capability::CommentIssues],
        Role::Agent => &[Capability::ViewDashboard, Capability::CommentIssues],
        Role::Manager => &[
            Capability::ManageIssues,
            Capability::ViewDashboard,
            Capability::CommentIssues,
            Capability::ViewReports,
        ],
        Role::Admin => &[
            Capability::ManageIssues,
            Capability::ViewDashboard,
            Capability::CommentIssues,
            Capability::ViewReports,
            Capability::ViewAudit,
        ],
        // Security reviews dashboards, reports, and trails; it never works
        // issues itself.
        Role::SecurityAdmin => &[
            Capability::ViewDashboard,
            Capability::ViewReports,
            Capability::ViewAudit,
        ],
    }
}

// ---------------------------------------------------------------------------
// Permission model
// ---------------------------------------------------------------------------

/// Capability checks plus the policy-driven restricted list.
///
/// The restricted list only ever narrows surface access (it pushes a
/// principal off the mobile surface); it does not revoke capabilities.
#[derive(Debug, Clone, Default)]
pub struct PermissionModel {
    restricted_emails: HashSet<String>,
}

impl PermissionModel {
    /// Build a model with the given policy-restricted email addresses.
    #[must_use]
    pub fn with_restricted<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            restricted_emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_ascii_lowercase())
                .collect(),
        }
    }

    /// Whether the principal's role grants the capability.
    #[must_use]
    pub fn has_capability(&self, principal: &Principal, capability: Capability) -> bool {
        role_grants(principal.role).contains(&capability)
    }

    /// Require a capability, naming the action in the denial.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PermissionDenied`] when the role lacks the
    /// capability.
    pub fn require(
        &self,
        principal: &Principal,
        capability: Capability,
        action: &'static str,
    ) -> Result<(), EngineError> {
        if self.has_capability(principal, capability) {
            Ok(())
        } else {
            Err(EngineError::PermissionDenied { action })
        }
    }

    /// Whether the principal is restricted by the directory or by policy.
    #[must_use]
    pub fn is_restricted(&self, principal: &Principal) -> bool {
        principal.restricted
            || self
                .restricted_emails
                .contains(&principal.email.trim().to_ascii_lowercase())
    }

    /// Whether the principal belongs on the staff dashboard surface.
    #[must_use]
    pub fn is_dashboard_capable(&self, principal: &Principal) -> bool {
        self.has_capability(principal, Capability::ViewDashboard)
    }

    /// Whether the principal belongs on the mobile reporter surface.
    ///
    /// Dashboard-capable principals use the dashboard instead, and
    /// restricted principals are denied the mobile surface outright.
    #[must_use]
    pub fn is_mobile_capable(&self, principal: &Principal) -> bool {
        !self.is_restricted(principal) && !self.is_dashboard_capable(principal)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
