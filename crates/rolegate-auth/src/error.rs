//! Authentication and authorization error types.
//!
//! Every per-request failure is reported to the caller as a uniform denial.
//! The specific variant only travels through the logging path.

use std::fmt;

use crate::types::Role;

/// Errors that can occur while authenticating or authorizing a request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The username is not present in the credential store (or is disabled).
    #[error("Unknown user: {username}")]
    UnknownUser {
        /// The username that was looked up.
        username: String,
    },

    /// The candidate password does not match the stored hash.
    #[error("Bad password for user: {username}")]
    BadPassword {
        /// The username whose password did not verify.
        username: String,
    },

    /// The presented token has outlived its validity.
    #[error("Token expired")]
    TokenExpired,

    /// The persistent token signature does not verify against the server key.
    #[error("Token signature is invalid")]
    TokenInvalidSignature,

    /// The persistent token could not be decoded.
    #[error("Token is malformed")]
    TokenMalformed,

    /// The token was explicitly invalidated (logout).
    #[error("Token revoked")]
    TokenRevoked,

    /// The session token is not known to this process.
    #[error("Token unknown")]
    TokenUnknown,

    /// The request carried neither credentials nor a usable token.
    #[error("No credentials supplied")]
    NoCredentialsSupplied,

    /// The request path contains `.`/`..` segments or empty segments, so the
    /// router would dispatch on a different path than rules would match.
    #[error("Non-canonical request path: {path}")]
    NonCanonicalPath {
        /// The path as received.
        path: String,
    },

    /// The resolved identity holds no role dominating the required one.
    #[error("Insufficient role: requires {required}")]
    InsufficientRole {
        /// The role the request needed.
        required: Role,
    },

    /// The startup configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// The credential store failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `UnknownUser` error.
    #[must_use]
    pub fn unknown_user(username: impl Into<String>) -> Self {
        Self::UnknownUser {
            username: username.into(),
        }
    }

    /// Creates a new `BadPassword` error.
    #[must_use]
    pub fn bad_password(username: impl Into<String>) -> Self {
        Self::BadPassword {
            username: username.into(),
        }
    }

    /// Creates a new `InsufficientRole` error.
    #[must_use]
    pub fn insufficient_role(required: Role) -> Self {
        Self::InsufficientRole { required }
    }

    /// Creates a new `NonCanonicalPath` error.
    #[must_use]
    pub fn non_canonical_path(path: impl Into<String>) -> Self {
        Self::NonCanonicalPath { path: path.into() }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error was caused by the request rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        !self.is_server_error()
    }

    /// Returns `true` if this error was caused by the server.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. } | Self::Storage { .. } | Self::Internal { .. }
        )
    }

    /// Returns `true` if this is an authentication failure (identity not established).
    #[must_use]
    pub fn is_authentication_error(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Authentication | ErrorCategory::Token
        )
    }

    /// Returns `true` if this is an authorization failure (identity established, access refused).
    #[must_use]
    pub fn is_authorization_error(&self) -> bool {
        self.category() == ErrorCategory::Authorization
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnknownUser { .. } => ErrorCategory::Authentication,
            Self::BadPassword { .. } => ErrorCategory::Authentication,
            Self::NoCredentialsSupplied => ErrorCategory::Authentication,
            Self::TokenExpired => ErrorCategory::Token,
            Self::TokenInvalidSignature => ErrorCategory::Token,
            Self::TokenMalformed => ErrorCategory::Token,
            Self::TokenRevoked => ErrorCategory::Token,
            Self::TokenUnknown => ErrorCategory::Token,
            Self::NonCanonicalPath { .. } => ErrorCategory::Authorization,
            Self::InsufficientRole { .. } => ErrorCategory::Authorization,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Stable machine-readable reason, used in log fields and metric labels.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::UnknownUser { .. } => "unknown_user",
            Self::BadPassword { .. } => "bad_password",
            Self::TokenExpired => "token_expired",
            Self::TokenInvalidSignature => "token_invalid_signature",
            Self::TokenMalformed => "token_malformed",
            Self::TokenRevoked => "token_revoked",
            Self::TokenUnknown => "token_unknown",
            Self::NoCredentialsSupplied => "no_credentials_supplied",
            Self::NonCanonicalPath { .. } => "non_canonical_path",
            Self::InsufficientRole { .. } => "insufficient_role",
            Self::Configuration { .. } => "configuration_error",
            Self::Storage { .. } => "storage_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

/// Categories of authentication/authorization errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification failed.
    Authentication,
    /// Identity verified, permission check failed.
    Authorization,
    /// Token validation failed.
    Token,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Authorization => write!(f, "authorization"),
            Self::Token => write!(f, "token"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::unknown_user("mallory");
        assert_eq!(err.to_string(), "Unknown user: mallory");

        let err = AuthError::insufficient_role(Role::new("userEdit"));
        assert_eq!(err.to_string(), "Insufficient role: requires userEdit");

        let err = AuthError::TokenExpired;
        assert_eq!(err.to_string(), "Token expired");

        let err = AuthError::configuration("cycle between admin and userView");
        assert_eq!(
            err.to_string(),
            "Configuration error: cycle between admin and userView"
        );
    }

    #[test]
    fn test_error_predicates() {
        let err = AuthError::bad_password("userView");
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        assert!(err.is_authentication_error());
        assert!(!err.is_authorization_error());

        let err = AuthError::insufficient_role(Role::new("admin"));
        assert!(err.is_client_error());
        assert!(!err.is_authentication_error());
        assert!(err.is_authorization_error());

        let err = AuthError::TokenInvalidSignature;
        assert!(err.is_authentication_error());

        let err = AuthError::storage("store unavailable");
        assert!(!err.is_client_error());
        assert!(err.is_server_error());
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            AuthError::unknown_user("x").category(),
            ErrorCategory::Authentication
        );
        assert_eq!(
            AuthError::insufficient_role(Role::new("admin")).category(),
            ErrorCategory::Authorization
        );
        assert_eq!(AuthError::TokenRevoked.category(), ErrorCategory::Token);
        assert_eq!(
            AuthError::storage("x").category(),
            ErrorCategory::Infrastructure
        );
        assert_eq!(
            AuthError::configuration("x").category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_reason_code() {
        assert_eq!(AuthError::unknown_user("x").reason_code(), "unknown_user");
        assert_eq!(AuthError::bad_password("x").reason_code(), "bad_password");
        assert_eq!(
            AuthError::NoCredentialsSupplied.reason_code(),
            "no_credentials_supplied"
        );
        assert_eq!(
            AuthError::TokenInvalidSignature.reason_code(),
            "token_invalid_signature"
        );
        assert_eq!(
            AuthError::non_canonical_path("/a/../b").reason_code(),
            "non_canonical_path"
        );
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Authentication.to_string(), "authentication");
        assert_eq!(ErrorCategory::Authorization.to_string(), "authorization");
        assert_eq!(ErrorCategory::Token.to_string(), "token");
        assert_eq!(ErrorCategory::Configuration.to_string(), "configuration");
    }
}
