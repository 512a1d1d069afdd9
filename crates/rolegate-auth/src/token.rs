//! Session and persistent (remember-me) tokens.
//!
//! Session tokens are random and only meaningful to the process that minted
//! them. Persistent tokens are self-validating:
//!
//! ```text
//! base64url( username ":" expiry_ms ":" hex(hmac_sha256(key, username ":" expiry_ms)) )
//! ```
//!
//! so they survive a restart as long as the signing key stays the same.

use std::fmt;
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use time::OffsetDateTime;

use crate::AuthResult;
use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

const SESSION_TOKEN_BYTES: usize = 32;

/// Lifetime policy of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Short-lived, held server-side, lost on restart.
    Session,
    /// Long-lived, validated from its signature.
    Persistent,
}

impl TokenKind {
    /// Label used in logs and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Persistent => "persistent",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An opaque token handed to the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    /// Lifetime policy.
    pub kind: TokenKind,
    /// Wire value.
    pub value: String,
    /// How long the caller should keep it. `None` for browser-session lifetime.
    pub max_age: Option<Duration>,
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("kind", &self.kind)
            .field("max_age", &self.max_age)
            .finish_non_exhaustive()
    }
}

/// Generates a random session token value (hex, 256 bits).
#[must_use]
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Generates a random signing key, for deployments that did not configure one.
#[must_use]
pub fn generate_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Contents of a persistent token whose signature has been checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Username the token was issued to.
    pub username: String,
    /// Expiry, in milliseconds since the Unix epoch.
    pub expires_at_ms: i64,
    /// Hex signature, used as the revocation key.
    pub signature: String,
}

impl VerifiedToken {
    /// Returns `true` once `now_ms` has reached the expiry.
    #[must_use]
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// Signs and validates persistent tokens.
#[derive(Clone)]
pub struct RememberMeCodec {
    keyed: HmacSha256,
    validity: Duration,
}

impl RememberMeCodec {
    /// Creates a codec.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the key is empty or the validity is zero.
    pub fn new(key: impl AsRef<[u8]>, validity: Duration) -> AuthResult<Self> {
        let key = key.as_ref();
        if key.is_empty() {
            return Err(AuthError::configuration("remember-me key must not be empty"));
        }
        if validity.is_zero() {
            return Err(AuthError::configuration(
                "remember-me token validity must be greater than zero",
            ));
        }
        let keyed = <HmacSha256 as Mac>::new_from_slice(key)
            .map_err(|e| AuthError::configuration(format!("invalid remember-me key: {e}")))?;
        Ok(Self { keyed, validity })
    }

    /// Token validity.
    #[must_use]
    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issues a token for `username`, valid from now.
    #[must_use]
    pub fn issue(&self, username: &str) -> Token {
        Token {
            kind: TokenKind::Persistent,
            value: self.encode(username, now_ms()),
            max_age: Some(self.validity),
        }
    }

    /// Encodes a token for `username` issued at `issued_at_ms`.
    #[must_use]
    pub fn encode(&self, username: &str, issued_at_ms: i64) -> String {
        let validity_ms = i64::try_from(self.validity.as_millis()).unwrap_or(i64::MAX);
        let expires_at_ms = issued_at_ms.saturating_add(validity_ms);
        let payload = format!("{username}:{expires_at_ms}");
        let signature = hex::encode(self.mac(&payload).finalize().into_bytes());
        URL_SAFE_NO_PAD.encode(format!("{payload}:{signature}"))
    }

    /// Decodes a token and checks its signature, ignoring expiry.
    ///
    /// # Errors
    ///
    /// - `AuthError::TokenMalformed` if the token cannot be decoded
    /// - `AuthError::TokenInvalidSignature` if the signature does not match this key
    pub fn verify_signature(&self, token: &str) -> AuthResult<VerifiedToken> {
        let decoded = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('=').as_bytes())
            .map_err(|_| AuthError::TokenMalformed)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::TokenMalformed)?;

        // Usernames may contain ':', so split from the right.
        let mut parts = decoded.rsplitn(3, ':');
        let (Some(signature), Some(expiry), Some(username)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::TokenMalformed);
        };
        if username.is_empty() {
            return Err(AuthError::TokenMalformed);
        }
        let expires_at_ms: i64 = expiry.parse().map_err(|_| AuthError::TokenMalformed)?;
        let signature_bytes = hex::decode(signature).map_err(|_| AuthError::TokenMalformed)?;

        self.mac(&format!("{username}:{expiry}"))
            .verify_slice(&signature_bytes)
            .map_err(|_| AuthError::TokenInvalidSignature)?;

        Ok(VerifiedToken {
            username: username.to_owned(),
            expires_at_ms,
            signature: signature.to_ascii_lowercase(),
        })
    }

    /// Decodes a token, checking signature and expiry against `now_ms`.
    ///
    /// # Errors
    ///
    /// Everything [`RememberMeCodec::verify_signature`] returns, plus
    /// `AuthError::TokenExpired`.
    pub fn decode(&self, token: &str, now_ms: i64) -> AuthResult<VerifiedToken> {
        let verified = self.verify_signature(token)?;
        if verified.is_expired_at(now_ms) {
            return Err(AuthError::TokenExpired);
        }
        Ok(verified)
    }

    fn mac(&self, payload: &str) -> HmacSha256 {
        let mut mac = self.keyed.clone();
        mac.update(payload.as_bytes());
        mac
    }
}

impl fmt::Debug for RememberMeCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RememberMeCodec")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}
