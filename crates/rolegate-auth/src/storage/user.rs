//! User storage trait and the in-memory credential store.

use std::collections::BTreeSet;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::password::CredentialHasher;
use crate::types::{Identity, Role};

// =============================================================================
// Stored User
// =============================================================================

/// A user record as held by the credential store.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoredUser {
    /// Unique username.
    pub username: String,

    /// PHC-formatted password hash.
    pub password_hash: String,

    /// Roles assigned directly to the user.
    #[serde(default)]
    pub roles: BTreeSet<Role>,

    /// Disabled users cannot authenticate.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl StoredUser {
    /// Creates an enabled user from an existing password hash.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password_hash: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
    ) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            roles: roles.into_iter().collect(),
            enabled: true,
        }
    }

    /// Creates an enabled user, hashing the plaintext password.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing fails.
    pub fn with_password(
        username: impl Into<String>,
        password: &str,
        roles: impl IntoIterator<Item = Role>,
        hasher: &dyn CredentialHasher,
    ) -> AuthResult<Self> {
        Ok(Self::new(username, hasher.hash(password)?, roles))
    }

    /// Converts the record into a verified identity.
    #[must_use]
    pub fn to_identity(&self) -> Identity {
        Identity::new(self.username.clone(), self.roles.iter().cloned())
    }
}

impl std::fmt::Debug for StoredUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredUser")
            .field("username", &self.username)
            .field("roles", &self.roles)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Storage Trait
// =============================================================================

/// Credential store lookups.
///
/// Lookups may block on I/O; callers must not hold cache locks across them.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Finds a user by username.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if no such user exists.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Storage` if the backend fails.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<StoredUser>>;
}

// =============================================================================
// In-Memory Store
// =============================================================================

/// Concurrent in-memory credential store.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: DashMap<String, StoredUser>,
}

impl InMemoryUserStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the given users.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = StoredUser>) -> Self {
        let store = Self::new();
        for user in users {
            store.insert(user);
        }
        store
    }

    /// Inserts or replaces a user. Returns the previous record, if any.
    pub fn insert(&self, user: StoredUser) -> Option<StoredUser> {
        self.users.insert(user.username.clone(), user)
    }

    /// Removes a user. Returns the removed record, if any.
    pub fn remove(&self, username: &str) -> Option<StoredUser> {
        self.users.remove(username).map(|(_, user)| user)
    }

    /// Enables or disables a user. Returns `false` if the user doesn't exist.
    pub fn set_enabled(&self, username: &str, enabled: bool) -> bool {
        match self.users.get_mut(username) {
            Some(mut user) => {
                user.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Number of stored users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserStorage for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<StoredUser>> {
        Ok(self.users.get(username).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::Argon2Hasher;

    #[tokio::test]
    async fn test_insert_and_find() {
        let store = InMemoryUserStore::new();
        store.insert(StoredUser::new("userView", "$hash", [Role::new("userView")]));

        let user = store.find_by_username("userView").await.unwrap().unwrap();
        assert_eq!(user.username, "userView");
        assert!(user.roles.contains("userView"));
        assert!(user.enabled);

        assert!(store.find_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_replace_and_remove() {
        let store = InMemoryUserStore::with_users([StoredUser::new("a", "$h1", [])]);
        let previous = store.insert(StoredUser::new("a", "$h2", [Role::new("admin")]));
        assert_eq!(previous.unwrap().password_hash, "$h1");
        assert_eq!(store.len(), 1);

        assert!(store.remove("a").is_some());
        assert!(store.is_empty());
        assert!(store.find_by_username("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_enabled() {
        let store = InMemoryUserStore::with_users([StoredUser::new("a", "$h", [])]);
        assert!(store.set_enabled("a", false));
        assert!(!store.find_by_username("a").await.unwrap().unwrap().enabled);
        assert!(!store.set_enabled("missing", false));
    }

    #[test]
    fn test_with_password_hashes_and_debug_hides_hash() {
        let hasher = Argon2Hasher::new(1024, 1, 1).unwrap();
        let user =
            StoredUser::with_password("userEdit", "passEdit", [Role::new("userEdit")], &hasher)
                .unwrap();
        assert!(hasher.verify("passEdit", &user.password_hash).unwrap());

        let rendered = format!("{user:?}");
        assert!(!rendered.contains(&user.password_hash));
        assert_eq!(user.to_identity().username, "userEdit");
    }
}
