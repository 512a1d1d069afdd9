//! The authorization engine.
//!
//! One call to [`AuthorizationEngine::decide`] drives a request through
//!
//! ```text
//! Unauthenticated → Authenticating → Authenticated → Authorized | Denied
//! ```
//!
//! 0. A path that is not in normalized form (`.`/`..` or empty segments)
//!    is denied outright, since the router would dispatch it elsewhere.
//! 1. A `Public` path is authorized without resolving any identity.
//! 2. Otherwise an identity is resolved: session token first, then Basic
//!    credentials, then a persistent token. Credentials are only verified
//!    when the session did not already yield the same user.
//! 3. The path requirement is checked, then the operation requirement.
//!    Both must pass; the first failure is the denial reason.
//!
//! Tokens minted while resolving the identity are returned in
//! [`AccessDecision::issued`] even when the request is finally denied.

use std::fmt;
use std::sync::Arc;

use crate::AuthResult;
use crate::audit;
use crate::cache::{IdentityCache, SessionPolicy};
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::hierarchy::RoleHierarchy;
use crate::password::{Argon2Hasher, CredentialHasher};
use crate::rules::{self, AuthorizationRequirement, OperationPolicy, RuleTable};
use crate::storage::{InMemoryUserStore, StoredUser, UserStorage};
use crate::token::{self, RememberMeCodec, Token, TokenKind};
use crate::types::{Credentials, Identity};
use crate::verifier::CredentialVerifier;

// =============================================================================
// Request / Decision
// =============================================================================

/// What the engine needs to know about an incoming request.
#[derive(Debug, Clone, Default)]
pub struct AccessRequest {
    /// HTTP method, only used for logging.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Operation id of the handler the request routes to, if known.
    pub operation: Option<String>,
    /// Basic credentials.
    pub credentials: Option<Credentials>,
    /// Session token presented by the caller.
    pub session_token: Option<String>,
    /// Persistent token presented by the caller.
    pub remember_me_token: Option<String>,
    /// Caller asked for a persistent token on successful login.
    pub remember_me_requested: bool,
}

impl AccessRequest {
    /// Creates an anonymous request.
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Sets the operation id.
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Sets Basic credentials.
    #[must_use]
    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    /// Sets the session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Sets the persistent token.
    #[must_use]
    pub fn with_remember_me_token(mut self, token: impl Into<String>) -> Self {
        self.remember_me_token = Some(token.into());
        self
    }

    /// Requests a persistent token on successful login.
    #[must_use]
    pub fn remember_me(mut self, requested: bool) -> Self {
        self.remember_me_requested = requested;
        self
    }
}

/// Per-request state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Nothing known about the caller yet.
    Unauthenticated,
    /// Identity resolution in progress.
    Authenticating,
    /// Identity resolved, requirements not yet checked.
    Authenticated,
    /// Access granted.
    Authorized,
    /// Access refused.
    Denied,
}

/// Where the identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentitySource {
    /// No identity was resolved.
    Anonymous,
    /// Session token cache hit.
    Session,
    /// Persistent token.
    RememberMe,
    /// Credentials verified on this request.
    Credentials,
}

impl IdentitySource {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Session => "session",
            Self::RememberMe => "remember_me",
            Self::Credentials => "credentials",
        }
    }
}

impl fmt::Display for IdentitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`AuthorizationEngine::decide`].
#[derive(Debug, Clone)]
pub struct AccessDecision {
    /// Final state, `Authorized` or `Denied`.
    pub state: RequestState,
    /// The resolved identity, if any.
    pub identity: Option<Arc<Identity>>,
    /// Where the identity came from.
    pub source: IdentitySource,
    /// Why access was refused.
    pub denial: Option<AuthError>,
    /// Tokens to hand back to the caller.
    pub issued: Vec<Token>,
}

impl AccessDecision {
    fn new() -> Self {
        Self {
            state: RequestState::Unauthenticated,
            identity: None,
            source: IdentitySource::Anonymous,
            denial: None,
            issued: Vec::new(),
        }
    }

    fn deny(&mut self, reason: AuthError) {
        self.state = RequestState::Denied;
        self.denial = Some(reason);
    }

    /// Returns `true` if access was granted.
    pub fn is_authorized(&self) -> bool {
        self.state == RequestState::Authorized
    }

    /// Username of the resolved identity.
    pub fn username(&self) -> Option<&str> {
        self.identity.as_deref().map(|identity| identity.username.as_str())
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Composes hierarchy, rules, verifier and cache into allow/deny decisions.
#[derive(Debug)]
pub struct AuthorizationEngine {
    hierarchy: RoleHierarchy,
    rules: RuleTable,
    operations: OperationPolicy,
    verifier: CredentialVerifier,
    cache: Arc<IdentityCache>,
    sessions_enabled: bool,
}

impl AuthorizationEngine {
    /// Creates an engine from its parts.
    pub fn new(
        hierarchy: RoleHierarchy,
        rules: RuleTable,
        operations: OperationPolicy,
        verifier: CredentialVerifier,
        cache: Arc<IdentityCache>,
    ) -> Self {
        Self {
            hierarchy,
            rules,
            operations,
            verifier,
            cache,
            sessions_enabled: true,
        }
    }

    /// Stops issuing session tokens after verification.
    #[must_use]
    pub fn without_sessions(mut self) -> Self {
        self.sessions_enabled = false;
        self
    }

    /// Builds an engine and an in-memory store seeded with the configured users.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the configuration does not validate.
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        let hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2Hasher::new(
            config.password.memory_kib,
            config.password.iterations,
            config.password.parallelism,
        )?);
        let store = Arc::new(seed_store(config, hasher.as_ref())?);
        Self::from_config_with(config, store, hasher)
    }

    /// Builds an engine over an existing store and hasher.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the configuration does not validate.
    pub fn from_config_with(
        config: &AuthConfig,
        store: Arc<dyn UserStorage>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> AuthResult<Self> {
        config.validate()?;

        let hierarchy = config.roles.build()?;

        let mut rules = RuleTable::new();
        for rule in &config.rules {
            rules.push(&rule.pattern, rule.requirement.clone())?;
        }

        let operations: OperationPolicy = config
            .operations
            .iter()
            .map(|op| (op.id.clone(), op.requirement.clone()))
            .collect();

        let mut cache = IdentityCache::new(
            Arc::clone(&store),
            SessionPolicy {
                idle_timeout: config.session.idle_timeout,
                max_lifetime: config.session.max_lifetime,
            },
        );
        if config.remember_me.enabled {
            let key = match &config.remember_me.key {
                Some(key) => key.clone(),
                None => {
                    tracing::warn!(
                        "No remember-me key configured; generated a random one. \
                         Persistent tokens will not survive a restart."
                    );
                    token::generate_key()
                }
            };
            cache = cache.with_remember_me(RememberMeCodec::new(
                key,
                config.remember_me.token_validity,
            )?);
        }

        let verifier = CredentialVerifier::new(store, hasher)?;

        tracing::info!(
            rules = rules.len(),
            operations = operations.len(),
            sessions = config.session.enabled,
            remember_me = config.remember_me.enabled,
            "Authorization engine initialized"
        );

        let engine = Self::new(hierarchy, rules, operations, verifier, Arc::new(cache));
        Ok(if config.session.enabled {
            engine
        } else {
            engine.without_sessions()
        })
    }

    /// The identity cache, shared with background cleanup.
    pub fn cache(&self) -> &Arc<IdentityCache> {
        &self.cache
    }

    /// The credential verifier.
    pub fn verifier(&self) -> &CredentialVerifier {
        &self.verifier
    }

    /// The role hierarchy.
    pub fn hierarchy(&self) -> &RoleHierarchy {
        &self.hierarchy
    }

    /// The path rules.
    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// The operation rules.
    pub fn operations(&self) -> &OperationPolicy {
        &self.operations
    }

    /// Decides whether a request may proceed. Never fails: every problem
    /// becomes a denial.
    pub async fn decide(&self, request: &AccessRequest) -> AccessDecision {
        let mut decision = AccessDecision::new();
        self.evaluate(request, &mut decision).await;
        audit::record_decision(request, &decision);
        decision
    }

    async fn evaluate(&self, request: &AccessRequest, decision: &mut AccessDecision) {
        if !rules::is_canonical_path(&request.path) {
            decision.deny(AuthError::non_canonical_path(&request.path));
            return;
        }

        let path_requirement = self.rules.requirement_for(&request.path);
        let operation_requirement = request
            .operation
            .as_deref()
            .and_then(|operation| self.operations.requirement_for(operation));

        if path_requirement.is_public() {
            match operation_requirement {
                Some(requirement) if !requirement.is_public() => {
                    decision.deny(AuthError::NoCredentialsSupplied);
                }
                _ => decision.state = RequestState::Authorized,
            }
            return;
        }

        decision.state = RequestState::Authenticating;
        let identity = match self.resolve_identity(request, decision).await {
            Ok(identity) => identity,
            Err(reason) => {
                decision.deny(reason);
                return;
            }
        };
        decision.state = RequestState::Authenticated;

        let outcome = self
            .check(&identity, path_requirement)
            .and_then(|()| match operation_requirement {
                Some(requirement) => self.check(&identity, requirement),
                None => Ok(()),
            });

        match outcome {
            Ok(()) => decision.state = RequestState::Authorized,
            Err(reason) => decision.deny(reason),
        }
    }

    /// Resolves the caller's identity, recording its source and any
    /// tokens issued along the way.
    async fn resolve_identity(
        &self,
        request: &AccessRequest,
        decision: &mut AccessDecision,
    ) -> AuthResult<Arc<Identity>> {
        let mut token_failure = None;

        let mut session_identity = None;
        if let Some(value) = request.session_token.as_deref() {
            match self.cache.lookup(TokenKind::Session, value).await {
                Ok(identity) => session_identity = Some(identity),
                Err(reason) => token_failure = Some(reason),
            }
        }

        if let Some(credentials) = &request.credentials {
            let already_resolved = session_identity
                .as_ref()
                .is_some_and(|identity| identity.username == credentials.username);
            if !already_resolved {
                let identity = Arc::new(self.verifier.verify_credentials(credentials).await?);
                decision.identity = Some(Arc::clone(&identity));
                decision.source = IdentitySource::Credentials;
                if self.sessions_enabled {
                    decision.issued.push(self.cache.put(Arc::clone(&identity)));
                }
                if request.remember_me_requested {
                    decision.issued.extend(self.cache.put_persistent(&identity));
                }
                return Ok(identity);
            }
        }

        if let Some(identity) = session_identity {
            decision.identity = Some(Arc::clone(&identity));
            decision.source = IdentitySource::Session;
            return Ok(identity);
        }

        if let Some(value) = request.remember_me_token.as_deref() {
            match self.cache.lookup(TokenKind::Persistent, value).await {
                Ok(identity) => {
                    decision.identity = Some(Arc::clone(&identity));
                    decision.source = IdentitySource::RememberMe;
                    if self.sessions_enabled {
                        decision.issued.push(self.cache.put(Arc::clone(&identity)));
                    }
                    return Ok(identity);
                }
                Err(reason) => token_failure = Some(reason),
            }
        }

        Err(token_failure.unwrap_or(AuthError::NoCredentialsSupplied))
    }

    /// Checks one requirement against a resolved identity.
    fn check(&self, identity: &Identity, requirement: &AuthorizationRequirement) -> AuthResult<()> {
        match requirement {
            AuthorizationRequirement::Public | AuthorizationRequirement::AuthenticatedOnly => {
                Ok(())
            }
            AuthorizationRequirement::RequiresRole(required) => {
                if self.hierarchy.any_dominates(&identity.roles, required) {
                    Ok(())
                } else {
                    Err(AuthError::insufficient_role(required.clone()))
                }
            }
        }
    }

    /// Invalidates the tokens presented on logout.
    pub fn logout(&self, session_token: Option<&str>, remember_me_token: Option<&str>) -> bool {
        let mut invalidated = false;
        if let Some(value) = session_token {
            invalidated |= self.cache.invalidate(TokenKind::Session, value);
        }
        if let Some(value) = remember_me_token {
            invalidated |= self.cache.invalidate(TokenKind::Persistent, value);
        }
        tracing::debug!(invalidated, "Logout processed");
        invalidated
    }
}

/// Builds an in-memory store from the configured users, hashing plaintext
/// passwords.
///
/// # Errors
///
/// Returns an error if hashing fails.
pub fn seed_store(
    config: &AuthConfig,
    hasher: &dyn CredentialHasher,
) -> AuthResult<InMemoryUserStore> {
    let store = InMemoryUserStore::new();
    for user in &config.users {
        let password_hash = match (&user.password, &user.password_hash) {
            (_, Some(hash)) => hash.clone(),
            (Some(password), None) => hasher.hash(password)?,
            (None, None) => {
                return Err(AuthError::configuration(format!(
                    "user '{}' has no password",
                    user.username
                )));
            }
        };
        let mut stored = StoredUser::new(user.username.clone(), password_hash, user.role_set());
        stored.enabled = user.enabled;
        store.insert(stored);
    }
    Ok(store)
}
