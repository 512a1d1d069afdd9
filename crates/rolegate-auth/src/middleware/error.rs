//! Uniform denial responses.
//!
//! Every denial carries the same body so callers cannot tell an unknown
//! user from a wrong password or a missing role. Only the status differs:
//! 401 (with a Basic challenge) when no identity was established, 403 when
//! one was but it lacks the required role.

use std::sync::Arc;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

/// Realm used when an [`AuthError`] is rendered without state.
pub const DEFAULT_REALM: &str = "Realm";

/// A rendered denial.
#[derive(Debug, Clone)]
pub struct AccessDenied {
    realm: Arc<str>,
    identity_resolved: bool,
}

impl AccessDenied {
    /// Creates a denial for the given realm.
    pub fn new(realm: impl Into<Arc<str>>, identity_resolved: bool) -> Self {
        Self {
            realm: realm.into(),
            identity_resolved,
        }
    }

    /// HTTP status of the denial.
    pub fn status(&self) -> StatusCode {
        if self.identity_resolved {
            StatusCode::FORBIDDEN
        } else {
            StatusCode::UNAUTHORIZED
        }
    }
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(json!({ "error": "access_denied" }))).into_response();

        if status == StatusCode::UNAUTHORIZED {
            let challenge = format!("Basic realm=\"{}\"", self.realm.replace('"', "\\\""));
            if let Ok(value) = HeaderValue::from_str(&challenge) {
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, value);
            }
        }

        response
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        tracing::debug!(reason = self.reason_code(), "Rendering access denial");
        AccessDenied::new(DEFAULT_REALM, self.is_authorization_error()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_unauthenticated_denial() {
        let response = AccessDenied::new("Rolegate", false).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"Rolegate\""
        );
        assert_eq!(body_of(response).await, json!({"error": "access_denied"}));
    }

    #[tokio::test]
    async fn test_forbidden_denial_has_no_challenge() {
        let response = AccessDenied::new("Rolegate", true).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        assert_eq!(body_of(response).await, json!({"error": "access_denied"}));
    }

    #[tokio::test]
    async fn test_errors_share_one_body() {
        let bad_password = AuthError::bad_password("userView").into_response();
        let unknown_user = AuthError::unknown_user("ghost").into_response();
        assert_eq!(bad_password.status(), unknown_user.status());
        assert_eq!(body_of(bad_password).await, body_of(unknown_user).await);

        let forbidden = AuthError::insufficient_role(Role::new("admin")).into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    }
}
