//! Authentication and authorization configuration.
//!
//! Everything here is startup configuration: the role hierarchy, the rule
//! tables, the hashing work factor, token lifetimes and the seeded users.
//! Nothing is reloaded at runtime.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! realm = "Rolegate"
//!
//! [auth.roles]
//! declared = ["admin", "userEdit", "userView"]
//! hierarchy = ["admin > userEdit > userView"]
//!
//! [[auth.rules]]
//! pattern = "/admin/**"
//! requirement = { role = "admin" }
//!
//! [[auth.operations]]
//! id = "api.testEdit"
//! requirement = { role = "userEdit" }
//!
//! [auth.remember_me]
//! key = "change-me"
//! token_validity = "14d"
//!
//! [[auth.users]]
//! username = "userView"
//! password = "passView"
//! roles = ["userView"]
//! ```

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AuthError;
use crate::hierarchy::RoleHierarchy;
use crate::password;
use crate::rules::{AuthorizationRequirement, PathPattern};
use crate::types::Role;

/// Root authentication and authorization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Realm announced in `WWW-Authenticate` challenges.
    pub realm: String,

    /// Declared roles and their hierarchy.
    pub roles: RolesConfig,

    /// Path rules, first-declared-wins.
    pub rules: Vec<RuleConfig>,

    /// Operation-level rules.
    pub operations: Vec<OperationConfig>,

    /// Password hashing work factor.
    pub password: PasswordConfig,

    /// Session tokens.
    pub session: SessionConfig,

    /// Persistent (remember-me) tokens.
    pub remember_me: RememberMeConfig,

    /// Users seeded into the in-memory credential store.
    pub users: Vec<UserConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            realm: "Realm".to_string(),
            roles: RolesConfig::default(),
            rules: vec![
                RuleConfig::new("/actuator/prometheus", AuthorizationRequirement::Public),
                RuleConfig::new("/logout", AuthorizationRequirement::Public),
                RuleConfig::new("/admin/**", AuthorizationRequirement::role("admin")),
                RuleConfig::new("/**", AuthorizationRequirement::AuthenticatedOnly),
            ],
            operations: vec![
                OperationConfig::new("api.testView", AuthorizationRequirement::role("userView")),
                OperationConfig::new("api.testEdit", AuthorizationRequirement::role("userEdit")),
            ],
            password: PasswordConfig::default(),
            session: SessionConfig::default(),
            remember_me: RememberMeConfig::default(),
            users: Vec::new(),
        }
    }
}

/// Declared roles and dominance lines.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RolesConfig {
    /// Every role that may appear anywhere else in the configuration.
    pub declared: Vec<String>,

    /// Lines of the form `a > b` or `a > b > c`.
    pub hierarchy: Vec<String>,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            declared: vec![
                "admin".to_string(),
                "userEdit".to_string(),
                "userView".to_string(),
            ],
            hierarchy: vec!["admin > userEdit > userView".to_string()],
        }
    }
}

impl RolesConfig {
    /// Builds the role hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` for undeclared roles, cycles or malformed lines.
    pub fn build(&self) -> Result<RoleHierarchy, AuthError> {
        RoleHierarchy::parse(
            self.declared.iter().map(String::as_str),
            &self.hierarchy.join("\n"),
        )
    }
}

/// One path rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Ant-style path pattern.
    pub pattern: String,
    /// What a matching request must satisfy.
    pub requirement: AuthorizationRequirement,
}

impl RuleConfig {
    /// Creates a rule entry.
    pub fn new(pattern: impl Into<String>, requirement: AuthorizationRequirement) -> Self {
        Self {
            pattern: pattern.into(),
            requirement,
        }
    }
}

/// One operation-level rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OperationConfig {
    /// Operation id, e.g. `api.testEdit`.
    pub id: String,
    /// What a caller of the operation must satisfy.
    pub requirement: AuthorizationRequirement,
}

impl OperationConfig {
    /// Creates an operation entry.
    pub fn new(id: impl Into<String>, requirement: AuthorizationRequirement) -> Self {
        Self {
            id: id.into(),
            requirement,
        }
    }
}

/// Argon2id work factor.
///
/// Verification is meant to be slow; the defaults cost on the order of
/// a hundred milliseconds per check on commodity hardware.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes.
    pub iterations: u32,
    /// Number of lanes.
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// Session token settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Issue a session token after every successful credential check.
    pub enabled: bool,

    /// Session expires after this long without a request.
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Session expires this long after creation, regardless of activity.
    #[serde(with = "humantime_serde")]
    pub max_lifetime: Duration,

    /// Cookie carrying the session token.
    pub cookie_name: String,

    /// How often expired sessions are purged.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,

    /// Mark token cookies `Secure` (HTTPS only).
    pub secure_cookies: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            idle_timeout: Duration::from_secs(30 * 60),      // 30 minutes
            max_lifetime: Duration::from_secs(8 * 60 * 60),  // 8 hours
            cookie_name: "SESSION".to_string(),
            cleanup_interval: Duration::from_secs(60),
            secure_cookies: false,
        }
    }
}

/// Persistent token settings.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RememberMeConfig {
    /// Accept and issue persistent tokens.
    pub enabled: bool,

    /// Signing key. When absent a random key is generated at startup and
    /// tokens stop validating after a restart.
    pub key: Option<String>,

    /// Token lifetime.
    #[serde(with = "humantime_serde")]
    pub token_validity: Duration,

    /// Cookie carrying the persistent token.
    pub cookie_name: String,

    /// Query parameter requesting a persistent token (`?remember-me=true`).
    pub parameter: String,
}

impl Default for RememberMeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: None,
            token_validity: Duration::from_secs(14 * 24 * 60 * 60), // 14 days
            cookie_name: "remember-me".to_string(),
            parameter: "remember-me".to_string(),
        }
    }
}

impl fmt::Debug for RememberMeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RememberMeConfig")
            .field("enabled", &self.enabled)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("token_validity", &self.token_validity)
            .field("cookie_name", &self.cookie_name)
            .field("parameter", &self.parameter)
            .finish()
    }
}

/// A seeded user. Exactly one of `password` / `password_hash` must be set.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UserConfig {
    /// Username.
    pub username: String,
    /// Plaintext password, hashed at startup.
    pub password: Option<String>,
    /// Pre-computed PHC hash.
    pub password_hash: Option<String>,
    /// Directly assigned roles.
    pub roles: Vec<String>,
    /// Disabled users cannot authenticate.
    pub enabled: bool,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: None,
            password_hash: None,
            roles: Vec::new(),
            enabled: true,
        }
    }
}

impl UserConfig {
    /// Directly assigned roles as [`Role`] values.
    pub fn role_set(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().map(|name| Role::new(name.as_str()))
    }
}

impl fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserConfig")
            .field("username", &self.username)
            .field("roles", &self.roles)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        AuthError::configuration(err.to_string())
    }
}

fn invalid(err: AuthError) -> ConfigError {
    match err {
        AuthError::Configuration { message } => ConfigError::InvalidValue(message),
        other => ConfigError::InvalidValue(other.to_string()),
    }
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - no roles are declared, or a role is declared twice
    /// - the hierarchy is malformed, cyclic, or names undeclared roles
    /// - a rule pattern does not compile
    /// - a rule, operation or user references an undeclared role
    /// - a user has both or neither of `password` / `password_hash`, or a
    ///   `password_hash` that is not an Argon2 PHC string
    /// - a lifetime is zero
    ///
    /// Returns `ConfigError::Missing` for an empty realm or username.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.realm.trim().is_empty() {
            return Err(ConfigError::Missing("auth.realm".to_string()));
        }

        if self.roles.declared.is_empty() {
            return Err(ConfigError::Missing("auth.roles.declared".to_string()));
        }
        let mut declared = HashSet::new();
        for role in &self.roles.declared {
            if role.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "role names must not be empty".to_string(),
                ));
            }
            if !declared.insert(role.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "role '{role}' is declared more than once"
                )));
            }
        }

        self.roles.build().map_err(invalid)?;

        let check_requirement = |what: &str, requirement: &AuthorizationRequirement| {
            match requirement.required_role() {
                Some(role) if !declared.contains(role.as_str()) => {
                    Err(ConfigError::InvalidValue(format!(
                        "{what} requires undeclared role '{role}'"
                    )))
                }
                _ => Ok(()),
            }
        };

        for rule in &self.rules {
            PathPattern::new(rule.pattern.as_str()).map_err(invalid)?;
            check_requirement(&format!("rule '{}'", rule.pattern), &rule.requirement)?;
        }

        let mut operation_ids = HashSet::new();
        for operation in &self.operations {
            if !operation_ids.insert(operation.id.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "operation '{}' is configured more than once",
                    operation.id
                )));
            }
            check_requirement(
                &format!("operation '{}'", operation.id),
                &operation.requirement,
            )?;
        }

        if self.password.memory_kib == 0
            || self.password.iterations == 0
            || self.password.parallelism == 0
        {
            return Err(ConfigError::InvalidValue(
                "password work factor values must be > 0".to_string(),
            ));
        }

        if self.session.idle_timeout.is_zero()
            || self.session.max_lifetime.is_zero()
            || self.session.cleanup_interval.is_zero()
        {
            return Err(ConfigError::InvalidValue(
                "session lifetimes must be > 0".to_string(),
            ));
        }
        if self.session.cookie_name.trim().is_empty() {
            return Err(ConfigError::Missing("auth.session.cookie_name".to_string()));
        }

        if self.remember_me.enabled {
            if self.remember_me.token_validity.is_zero() {
                return Err(ConfigError::InvalidValue(
                    "remember_me.token_validity must be > 0".to_string(),
                ));
            }
            if self.remember_me.key.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::InvalidValue(
                    "remember_me.key must not be empty".to_string(),
                ));
            }
            if self.remember_me.cookie_name.trim().is_empty() {
                return Err(ConfigError::Missing(
                    "auth.remember_me.cookie_name".to_string(),
                ));
            }
        }

        let mut usernames = HashSet::new();
        for user in &self.users {
            if user.username.trim().is_empty() {
                return Err(ConfigError::Missing("auth.users[].username".to_string()));
            }
            if !usernames.insert(user.username.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "user '{}' is configured more than once",
                    user.username
                )));
            }
            match (&user.password, &user.password_hash) {
                (Some(_), None) => {}
                (None, Some(hash)) => {
                    password::check_stored_hash(hash).map_err(|e| {
                        let reason = match e {
                            AuthError::Configuration { message } => message,
                            other => other.to_string(),
                        };
                        ConfigError::InvalidValue(format!(
                            "user '{}' has an unusable password_hash: {reason}",
                            user.username
                        ))
                    })?;
                }
                _ => {
                    return Err(ConfigError::InvalidValue(format!(
                        "user '{}' must set exactly one of password or password_hash",
                        user.username
                    )));
                }
            }
            for role in &user.roles {
                if !declared.contains(role.as_str()) {
                    return Err(ConfigError::InvalidValue(format!(
                        "user '{}' has undeclared role '{role}'",
                        user.username
                    )));
                }
            }
        }

        Ok(())
    }
}
