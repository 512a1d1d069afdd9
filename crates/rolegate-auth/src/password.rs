//! Password hashing primitive.
//!
//! Verification is deliberately expensive: the cost is what makes caching
//! verified identities worthwhile. Hashes use Argon2id with a configurable
//! work factor and are stored as PHC strings, so each stored hash carries
//! the parameters it was produced with.
//!
//! # Example
//!
//! ```
//! use rolegate_auth::password::{Argon2Hasher, CredentialHasher};
//!
//! let hasher = Argon2Hasher::new(4096, 1, 1).unwrap();
//! let hash = hasher.hash("passView").unwrap();
//! assert!(hash.starts_with("$argon2id$"));
//! assert!(hasher.verify("passView", &hash).unwrap());
//! assert!(!hasher.verify("passEdit", &hash).unwrap());
//! ```

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};

use crate::AuthResult;
use crate::error::AuthError;

/// Hash primitive used by the credential verifier.
///
/// Implementations are invoked from the blocking thread pool.
pub trait CredentialHasher: Send + Sync {
    /// Hashes a plaintext password for storage.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if hashing fails.
    fn hash(&self, password: &str) -> AuthResult<String>;

    /// Verifies a plaintext candidate against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if the stored hash cannot be parsed.
    fn verify(&self, candidate: &str, stored_hash: &str) -> AuthResult<bool>;
}

/// Argon2id hasher with a tunable work factor.
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Creates a hasher.
    ///
    /// # Arguments
    ///
    /// * `memory_kib` - Memory cost in KiB
    /// * `iterations` - Time cost (passes over memory)
    /// * `parallelism` - Degree of parallelism (lanes)
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if argon2 rejects the parameters.
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> AuthResult<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| AuthError::configuration(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

/// Checks that a stored hash is an Argon2 PHC string this hasher can verify.
///
/// # Errors
///
/// Returns `AuthError::Configuration` if the string does not parse, names
/// another algorithm (e.g. bcrypt `$2a$`), or carries invalid parameters.
pub fn check_stored_hash(stored_hash: &str) -> AuthResult<()> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|e| AuthError::configuration(format!("not a PHC string: {e}")))?;
    Algorithm::try_from(parsed.algorithm).map_err(|_| {
        AuthError::configuration(format!(
            "unsupported hash algorithm '{}', expected argon2id, argon2i or argon2d",
            parsed.algorithm
        ))
    })?;
    Params::try_from(&parsed)
        .map_err(|e| AuthError::configuration(format!("invalid argon2 parameters: {e}")))?;
    if parsed.hash.is_none() {
        return Err(AuthError::configuration("PHC string carries no hash output"));
    }
    Ok(())
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::internal(format!("password hashing failed: {e}")))?;
        Ok(hash.to_string())
    }

    fn verify(&self, candidate: &str, stored_hash: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(stored_hash)
            .map_err(|e| AuthError::internal(format!("stored hash is not a PHC string: {e}")))?;
        // Parameters embedded in the stored hash take precedence over ours.
        Ok(self
            .argon2
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_hasher() -> Argon2Hasher {
        Argon2Hasher::new(1024, 1, 1).unwrap()
    }

    #[test]
    fn test_hash_format() {
        let hash = fast_hasher().hash("passView").unwrap();
        assert!(hash.starts_with("$argon2id$"), "Hash should use Argon2id");
        assert!(hash.contains("m=1024,t=1,p=1"), "Hash should carry its work factor");
    }

    #[test]
    fn test_verify_correct_and_wrong_password() {
        let hasher = fast_hasher();
        let hash = hasher.hash("passAdmin").unwrap();

        assert!(hasher.verify("passAdmin", &hash).unwrap());
        assert!(!hasher.verify("passadmin", &hash).unwrap());
        assert!(!hasher.verify("", &hash).unwrap());
    }

    #[test]
    fn test_same_password_different_salts() {
        let hasher = fast_hasher();
        let hash1 = hasher.hash("passEdit").unwrap();
        let hash2 = hasher.hash("passEdit").unwrap();

        assert_ne!(hash1, hash2, "Same password should produce different hashes");
        assert!(hasher.verify("passEdit", &hash1).unwrap());
        assert!(hasher.verify("passEdit", &hash2).unwrap());
    }

    #[test]
    fn test_verify_uses_parameters_of_stored_hash() {
        let stored = Argon2Hasher::new(2048, 2, 1).unwrap().hash("secret").unwrap();
        assert!(fast_hasher().verify("secret", &stored).unwrap());
    }

    #[test]
    fn test_verify_invalid_hash_format() {
        let result = fast_hasher().verify("secret", "invalid_hash_format");
        assert!(matches!(result, Err(AuthError::Internal { .. })));
    }

    #[test]
    fn test_check_stored_hash() {
        let hash = fast_hasher().hash("passView").unwrap();
        assert!(check_stored_hash(&hash).is_ok());

        for bad in [
            "",
            "plaintext",
            "$2a$16$Mv3GLf6ZMiu9WdWhIDAbu.KN9Wg5zPgdmJgXhHv5Gxsw1lR3.R0Ha",
            "$argon2id$v=19$m=1,t=1,p=1$c2FsdHNhbHRzYWx0$aGFzaGhhc2hoYXNoaGFzaA",
            "$argon2id$v=19$m=4096,t=1,p=1$c2FsdHNhbHRzYWx0",
        ] {
            assert!(
                matches!(check_stored_hash(bad), Err(AuthError::Configuration { .. })),
                "{bad}"
            );
        }
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(matches!(
            Argon2Hasher::new(1, 1, 1),
            Err(AuthError::Configuration { .. })
        ));
    }
}
