//! Principal resolution: token in, [`Principal`] out.
//!
//! The engine never trusts ambient identity. Whatever fronts it (HTTP
//! middleware, a CLI session) resolves the caller's token here and passes
//! the explicit [`Principal`] into every operation.

use std::collections::HashMap;
use std::sync::RwLock;

use redress_core::EngineError;
use redress_core::model::Principal;

/// Verify a bearer token and fetch the principal behind it.
pub trait PrincipalResolver: Send + Sync {
    /// The principal for a valid token, `None` otherwise.
    fn resolve(&self, token: &str) -> Option<Principal>;

    /// Like [`PrincipalResolver::resolve`], but an unknown token is a
    /// denial.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::PermissionDenied`] for unknown or revoked
    /// tokens.
    fn authenticate(&self, token: &str) -> Result<Principal, EngineError> {
        self.resolve(token).ok_or(EngineError::PermissionDenied {
            action: "authenticate",
        })
    }
}

/// Fixed token table, for tests and single-tenant deployments.
#[derive(Debug, Default)]
pub struct StaticResolver {
    tokens: RwLock<HashMap<String, Principal>>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a token.
    pub fn insert(&self, token: impl Into<String>, principal: Principal) {
        self.tokens
            .write()
            .expect("token table lock poisoned")
            .insert(token.into(), principal);
    }

    /// Drop a token, e.g. on logout.
    pub fn revoke(&self, token: &str) {
        self.tokens
            .write()
            .expect("token table lock poisoned")
            .remove(token);
    }
}

impl PrincipalResolver for StaticResolver {
    fn resolve(&self, token: &str) -> Option<Principal> {
        self.tokens
            .read()
            .expect("token table lock poisoned")
            .get(token)
            .cloned()
    }
}
