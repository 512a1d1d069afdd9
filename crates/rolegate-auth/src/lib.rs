//! # rolegate-auth
//!
//! Role-hierarchy authorization with credential-verification caching.
//!
//! This crate provides:
//! - A static role hierarchy with precomputed reachability
//! - Ordered path rules and operation-level rules
//! - A deliberately expensive credential verifier over a pluggable user store
//! - An identity cache for session and signed persistent (remember-me) tokens
//! - The engine that composes them into allow/deny decisions
//! - Axum middleware, extractors and a logout handler
//!
//! ## Modules
//!
//! - [`hierarchy`] - Role dominance graph
//! - [`rules`] - Path patterns, requirements and rule tables
//! - [`verifier`] - Username/password verification
//! - [`cache`] - Token → identity cache
//! - [`engine`] - Per-request decision state machine
//! - [`config`] - Startup configuration
//! - [`middleware`] - HTTP middleware and denial responses
//! - [`audit`] - Decision logging
//!
//! ## Example
//!
//! ```ignore
//! use rolegate_auth::prelude::*;
//!
//! let engine = AuthorizationEngine::from_config(&AuthConfig::default())?;
//! let decision = engine
//!     .decide(&AccessRequest::new("GET", "/admin/test").with_credentials("userAdmin", "passAdmin"))
//!     .await;
//! assert!(decision.is_authorized());
//! ```

pub mod audit;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod hierarchy;
pub mod http;
pub mod middleware;
pub mod password;
pub mod rules;
pub mod storage;
pub mod token;
pub mod types;
pub mod verifier;

pub use cache::{CacheStats, IdentityCache, SessionPolicy};
pub use config::{AuthConfig, ConfigError};
pub use engine::{
    AccessDecision, AccessRequest, AuthorizationEngine, IdentitySource, RequestState,
};
pub use error::{AuthError, ErrorCategory};
pub use extractors::{OptionalPrincipal, Principal};
pub use hierarchy::RoleHierarchy;
pub use http::logout_handler;
pub use middleware::{AccessDenied, AccessOutcome, AuthState, CookieSettings, authorize};
pub use password::{Argon2Hasher, CredentialHasher};
pub use rules::{AuthorizationRequirement, OperationPolicy, RuleTable};
pub use storage::{InMemoryUserStore, StoredUser, UserStorage};
pub use token::{RememberMeCodec, Token, TokenKind};
pub use types::{Credentials, Identity, Role};
pub use verifier::CredentialVerifier;

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use rolegate_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::cache::{CacheStats, IdentityCache, SessionPolicy};
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::engine::{
        AccessDecision, AccessRequest, AuthorizationEngine, IdentitySource, RequestState,
    };
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::extractors::{OptionalPrincipal, Principal};
    pub use crate::hierarchy::RoleHierarchy;
    pub use crate::middleware::{AuthState, authorize};
    pub use crate::rules::{AuthorizationRequirement, OperationPolicy, RuleTable};
    pub use crate::storage::{InMemoryUserStore, StoredUser, UserStorage};
    pub use crate::token::{Token, TokenKind};
    pub use crate::types::{Credentials, Identity, Role};
}
