//! Request credentials.

use std::fmt;

/// A username/password pair taken from the request (HTTP Basic).
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// The claimed username.
    pub username: String,
    password: String,
}

impl Credentials {
    /// Creates credentials from a username and a plaintext password.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns the plaintext password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

// The password must never reach a log line.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let credentials = Credentials::new("userView", "passView");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("userView"));
        assert!(!rendered.contains("passView"));
    }
}
