//! Identity cache: maps tokens to previously verified identities.
//!
//! ## Token kinds
//!
//! - **Session** tokens live in a sharded in-memory map (`DashMap`). An entry
//!   expires when it has been idle longer than `idle_timeout` or has existed
//!   longer than `max_lifetime`. All sessions are lost on restart.
//! - **Persistent** tokens are not stored at all: a lookup re-checks the
//!   signature and expiry, then reloads the user's current roles from the
//!   credential store (no password hashing involved). Logged-out persistent
//!   tokens are remembered by signature until they would have expired.
//!
//! ## Concurrency
//!
//! Operations on one token are atomic with respect to each other (each runs
//! under that key's shard lock), while operations on tokens in different
//! shards proceed in parallel. No lock is held while the credential store is
//! consulted.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::AuthResult;
use crate::error::AuthError;
use crate::storage::UserStorage;
use crate::token::{self, RememberMeCodec, Token, TokenKind};
use crate::types::Identity;

/// Session lifetime limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Maximum time between two accesses.
    pub idle_timeout: Duration,
    /// Maximum time since creation, regardless of activity.
    pub max_lifetime: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            max_lifetime: Duration::from_secs(8 * 60 * 60),
        }
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of live session entries.
    pub size: usize,
    /// Number of revoked persistent signatures still remembered.
    pub revoked: usize,
    /// Number of lookups that produced an identity.
    pub hits: u64,
    /// Number of lookups that did not.
    pub misses: u64,
    /// Number of entries removed because they expired.
    pub evictions: u64,
}

impl CacheStats {
    /// Hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

struct SessionEntry {
    identity: Arc<Identity>,
    created_at: Instant,
    last_access: Instant,
}

impl SessionEntry {
    fn is_expired(&self, now: Instant, policy: &SessionPolicy) -> bool {
        now.duration_since(self.last_access) >= policy.idle_timeout
            || now.duration_since(self.created_at) >= policy.max_lifetime
    }
}

/// Token → identity cache shared by all requests.
pub struct IdentityCache {
    sessions: DashMap<String, SessionEntry>,
    /// Revoked persistent-token signatures and their expiry (unix ms).
    revoked: DashMap<String, i64>,
    policy: SessionPolicy,
    remember_me: Option<RememberMeCodec>,
    store: Arc<dyn UserStorage>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl IdentityCache {
    /// Creates a cache with session support only.
    pub fn new(store: Arc<dyn UserStorage>, policy: SessionPolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            revoked: DashMap::new(),
            policy,
            remember_me: None,
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Enables persistent tokens signed by `codec`.
    #[must_use]
    pub fn with_remember_me(mut self, codec: RememberMeCodec) -> Self {
        self.remember_me = Some(codec);
        self
    }

    /// Returns `true` if persistent tokens can be issued and accepted.
    pub fn remember_me_enabled(&self) -> bool {
        self.remember_me.is_some()
    }

    /// Session lifetime limits.
    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Stores an identity under a fresh session token.
    pub fn put(&self, identity: Arc<Identity>) -> Token {
        let value = token::generate_session_token();
        let now = Instant::now();
        self.sessions.insert(
            value.clone(),
            SessionEntry {
                identity,
                created_at: now,
                last_access: now,
            },
        );
        Token {
            kind: TokenKind::Session,
            value,
            max_age: None,
        }
    }

    /// Issues a persistent token for an identity.
    ///
    /// Returns `None` when remember-me is disabled.
    pub fn put_persistent(&self, identity: &Identity) -> Option<Token> {
        self.remember_me
            .as_ref()
            .map(|codec| codec.issue(&identity.username))
    }

    /// Returns the identity for a token, or `None` on any kind of miss.
    pub async fn get(&self, kind: TokenKind, value: &str) -> Option<Arc<Identity>> {
        self.lookup(kind, value).await.ok()
    }

    /// Resolves a token, reporting why it was rejected.
    ///
    /// # Errors
    ///
    /// - `AuthError::TokenUnknown` for a session token this process never issued
    ///   (or that was invalidated)
    /// - `AuthError::TokenExpired` for an expired token of either kind
    /// - `AuthError::TokenMalformed` / `AuthError::TokenInvalidSignature` for
    ///   persistent tokens that do not decode or verify
    /// - `AuthError::TokenRevoked` for a logged-out persistent token
    /// - `AuthError::UnknownUser` if the persistent token's user no longer exists
    pub async fn lookup(&self, kind: TokenKind, value: &str) -> AuthResult<Arc<Identity>> {
        let result = match kind {
            TokenKind::Session => self.lookup_session(value),
            TokenKind::Persistent => self.lookup_persistent(value).await,
        };
        let counter = if result.is_ok() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        result
    }

    fn lookup_session(&self, value: &str) -> AuthResult<Arc<Identity>> {
        let now = Instant::now();
        match self.sessions.get_mut(value) {
            None => return Err(AuthError::TokenUnknown),
            Some(mut entry) => {
                if !entry.is_expired(now, &self.policy) {
                    entry.last_access = now;
                    return Ok(Arc::clone(&entry.identity));
                }
            }
        }

        // Shard guard released above; re-check under the removal lock.
        if self
            .sessions
            .remove_if(value, |_, entry| entry.is_expired(now, &self.policy))
            .is_some()
        {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        Err(AuthError::TokenExpired)
    }

    async fn lookup_persistent(&self, value: &str) -> AuthResult<Arc<Identity>> {
        let codec = self.remember_me.as_ref().ok_or(AuthError::TokenUnknown)?;
        let verified = codec.decode(value, token::now_ms())?;

        if self.revoked.contains_key(&verified.signature) {
            return Err(AuthError::TokenRevoked);
        }

        let user = self
            .store
            .find_by_username(&verified.username)
            .await?
            .filter(|user| user.enabled)
            .ok_or_else(|| AuthError::unknown_user(&verified.username))?;

        // A logout may have raced with the store lookup.
        if self.revoked.contains_key(&verified.signature) {
            return Err(AuthError::TokenRevoked);
        }

        Ok(Arc::new(user.to_identity()))
    }

    /// Removes a token. Returns `true` if something was invalidated.
    ///
    /// Persistent tokens with a valid signature are added to the revocation
    /// set even if already expired; tokens that fail the signature check are
    /// ignored.
    pub fn invalidate(&self, kind: TokenKind, value: &str) -> bool {
        match kind {
            TokenKind::Session => self.sessions.remove(value).is_some(),
            TokenKind::Persistent => {
                let Some(codec) = &self.remember_me else {
                    return false;
                };
                match codec.verify_signature(value) {
                    Ok(verified) => {
                        self.revoked
                            .insert(verified.signature, verified.expires_at_ms);
                        true
                    }
                    Err(_) => false,
                }
            }
        }
    }

    /// Drops every session. Persistent tokens stay valid.
    pub fn clear(&self) {
        self.sessions.clear();
    }

    /// Removes expired sessions and revocation records that outlived their token.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.sessions.retain(|_, entry| {
            if entry.is_expired(now, &self.policy) {
                removed += 1;
                false
            } else {
                true
            }
        });

        let now_ms = token::now_ms();
        self.revoked.retain(|_, expires_at_ms| {
            if now_ms >= *expires_at_ms {
                removed += 1;
                false
            } else {
                true
            }
        });

        if removed > 0 {
            self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        }

        removed
    }

    /// Cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.sessions.len(),
            revoked: self.revoked.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("policy", &self.policy)
            .field("remember_me", &self.remember_me)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryUserStore, StoredUser};
    use crate::types::Role;

    fn store() -> Arc<InMemoryUserStore> {
        Arc::new(InMemoryUserStore::with_users([StoredUser::new(
            "userEdit",
            "$unused",
            [Role::new("userEdit")],
        )]))
    }

    fn identity() -> Arc<Identity> {
        Arc::new(Identity::new("userEdit", [Role::new("userEdit")]))
    }

    fn cache_with(policy: SessionPolicy) -> IdentityCache {
        IdentityCache::new(store(), policy).with_remember_me(
            RememberMeCodec::new("test", Duration::from_secs(3600)).unwrap(),
        )
    }

    fn cache() -> IdentityCache {
        cache_with(SessionPolicy::default())
    }

    #[tokio::test]
    async fn test_put_and_get_session() {
        let cache = cache();
        let token = cache.put(identity());
        assert_eq!(token.kind, TokenKind::Session);
        assert_eq!(token.max_age, None);

        let found = cache.get(TokenKind::Session, &token.value).await.unwrap();
        assert_eq!(found.username, "userEdit");

        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let cache = cache();
        assert_eq!(
            cache.lookup(TokenKind::Session, "nope").await,
            Err(AuthError::TokenUnknown)
        );
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_invalidate_session() {
        let cache = cache();
        let token = cache.put(identity());
        assert!(cache.invalidate(TokenKind::Session, &token.value));
        assert!(cache.get(TokenKind::Session, &token.value).await.is_none());
        assert!(!cache.invalidate(TokenKind::Session, &token.value));
    }

    #[tokio::test]
    async fn test_idle_timeout() {
        let cache = cache_with(SessionPolicy {
            idle_timeout: Duration::from_millis(20),
            max_lifetime: Duration::from_secs(60),
        });
        let token = cache.put(identity());
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(
            cache.lookup(TokenKind::Session, &token.value).await,
            Err(AuthError::TokenExpired)
        );
        assert_eq!(cache.stats().evictions, 1);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_policy_reports_configured_limits() {
        let policy = SessionPolicy {
            idle_timeout: Duration::from_secs(60),
            max_lifetime: Duration::from_secs(600),
        };
        assert_eq!(cache_with(policy).policy(), policy);
        assert_eq!(cache().policy(), SessionPolicy::default());
    }

    #[tokio::test]
    async fn test_access_extends_idle_but_not_lifetime() {
        let cache = cache_with(SessionPolicy {
            idle_timeout: Duration::from_millis(300),
            max_lifetime: Duration::from_millis(500),
        });
        let token = cache.put(identity());

        // Each access refreshes the idle window.
        for _ in 0..2 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            assert!(cache.get(TokenKind::Session, &token.value).await.is_some());
        }

        // Still inside the idle window but past the absolute lifetime.
        tokio::time::sleep(Duration::from_millis(220)).await;
        assert_eq!(
            cache.lookup(TokenKind::Session, &token.value).await,
            Err(AuthError::TokenExpired)
        );
    }

    #[tokio::test]
    async fn test_persistent_token_reloads_roles() {
        let store = store();
        let cache = IdentityCache::new(store.clone(), SessionPolicy::default()).with_remember_me(
            RememberMeCodec::new("test", Duration::from_secs(3600)).unwrap(),
        );
        let token = cache.put_persistent(&identity()).unwrap();
        assert_eq!(token.kind, TokenKind::Persistent);

        store.insert(StoredUser::new("userEdit", "$unused", [Role::new("admin")]));
        let found = cache.lookup(TokenKind::Persistent, &token.value).await.unwrap();
        assert!(found.has_direct_role("admin"));

        store.remove("userEdit");
        assert_eq!(
            cache.lookup(TokenKind::Persistent, &token.value).await,
            Err(AuthError::unknown_user("userEdit"))
        );
    }

    #[tokio::test]
    async fn test_persistent_token_revocation() {
        let cache = cache();
        let token = cache.put_persistent(&identity()).unwrap();
        assert!(cache.get(TokenKind::Persistent, &token.value).await.is_some());

        assert!(cache.invalidate(TokenKind::Persistent, &token.value));
        assert_eq!(
            cache.lookup(TokenKind::Persistent, &token.value).await,
            Err(AuthError::TokenRevoked)
        );
        assert_eq!(cache.stats().revoked, 1);

        // Garbage is not remembered.
        assert!(!cache.invalidate(TokenKind::Persistent, "garbage"));
        assert_eq!(cache.stats().revoked, 1);
    }

    #[tokio::test]
    async fn test_remember_me_disabled() {
        let cache = IdentityCache::new(store(), SessionPolicy::default());
        assert!(!cache.remember_me_enabled());
        assert!(cache.put_persistent(&identity()).is_none());
        assert_eq!(
            cache.lookup(TokenKind::Persistent, "anything").await,
            Err(AuthError::TokenUnknown)
        );
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let cache = cache_with(SessionPolicy {
            idle_timeout: Duration::from_millis(10),
            max_lifetime: Duration::from_secs(60),
        });
        for _ in 0..3 {
            cache.put(identity());
        }
        assert_eq!(cache.stats().size, 3);

        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(cache.cleanup_expired(), 3);
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.stats().evictions, 3);
    }

    #[tokio::test]
    async fn test_clear_drops_sessions_only() {
        let cache = cache();
        let session = cache.put(identity());
        let persistent = cache.put_persistent(&identity()).unwrap();
        cache.clear();
        assert!(cache.get(TokenKind::Session, &session.value).await.is_none());
        assert!(cache.get(TokenKind::Persistent, &persistent.value).await.is_some());
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            ..CacheStats::default()
        };
        assert!((stats.hit_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
