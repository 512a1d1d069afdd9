//! Credential verification against the user store.
//!
//! Every call pays the full hash cost, including calls for usernames that
//! do not exist (they are checked against a throwaway hash). Hashing runs on
//! the blocking thread pool so request workers stay responsive.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::{Rng, distributions::Alphanumeric};

use crate::AuthResult;
use crate::error::AuthError;
use crate::password::CredentialHasher;
use crate::storage::UserStorage;
use crate::types::{Credentials, Identity};

/// Verifies username/password pairs, producing identities.
pub struct CredentialVerifier {
    store: Arc<dyn UserStorage>,
    hasher: Arc<dyn CredentialHasher>,
    /// Hash of a random password, checked for unknown users.
    dummy_hash: Arc<str>,
    invocations: AtomicU64,
}

impl CredentialVerifier {
    /// Creates a verifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the hasher cannot produce the dummy hash.
    pub fn new(
        store: Arc<dyn UserStorage>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> AuthResult<Self> {
        let throwaway: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let dummy_hash = hasher.hash(&throwaway)?.into();

        Ok(Self {
            store,
            hasher,
            dummy_hash,
            invocations: AtomicU64::new(0),
        })
    }

    /// Verifies a password for a username.
    ///
    /// # Errors
    ///
    /// - `AuthError::UnknownUser` if the user is absent or disabled
    /// - `AuthError::BadPassword` if the password does not match
    /// - `AuthError::Storage` / `AuthError::Internal` on backend failures
    pub async fn verify(&self, username: &str, candidate: &str) -> AuthResult<Identity> {
        self.invocations.fetch_add(1, Ordering::Relaxed);

        let user = self
            .store
            .find_by_username(username)
            .await?
            .filter(|user| user.enabled);

        let stored_hash: Arc<str> = match &user {
            Some(user) => user.password_hash.as_str().into(),
            None => Arc::clone(&self.dummy_hash),
        };

        let matched = self.check_hash(candidate, stored_hash).await?;

        match user {
            None => {
                tracing::debug!(username = %username, "Credential verification failed: unknown user");
                Err(AuthError::unknown_user(username))
            }
            Some(_) if !matched => {
                tracing::debug!(username = %username, "Credential verification failed: bad password");
                Err(AuthError::bad_password(username))
            }
            Some(user) => Ok(user.to_identity()),
        }
    }

    /// Verifies request credentials.
    ///
    /// # Errors
    ///
    /// See [`CredentialVerifier::verify`].
    pub async fn verify_credentials(&self, credentials: &Credentials) -> AuthResult<Identity> {
        self.verify(&credentials.username, credentials.password()).await
    }

    /// Number of verifications performed so far.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }

    async fn check_hash(&self, candidate: &str, stored_hash: Arc<str>) -> AuthResult<bool> {
        let hasher = Arc::clone(&self.hasher);
        let candidate = candidate.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&candidate, &stored_hash))
            .await
            .map_err(|e| AuthError::internal(format!("password verification task failed: {e}")))?
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier")
            .field("invocations", &self.invocations())
            .finish_non_exhaustive()
    }
}
