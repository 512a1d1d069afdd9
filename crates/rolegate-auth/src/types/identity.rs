//! Verified identity.

use std::collections::BTreeSet;

use serde::Serialize;

use super::Role;

/// A principal whose credentials have been verified.
///
/// Created by the credential verifier on success and afterwards only held
/// as an identity-cache value or as a request-scoped object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    /// The verified username.
    pub username: String,

    /// Roles assigned directly to the user (not expanded through the hierarchy).
    pub roles: BTreeSet<Role>,
}

impl Identity {
    /// Creates an identity from a username and its directly assigned roles.
    #[must_use]
    pub fn new(username: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            username: username.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// Returns `true` if the role is assigned directly to this identity.
    #[must_use]
    pub fn has_direct_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
