//! Access to the identity resolved by the authorization middleware.

use std::sync::Arc;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AuthError;
use crate::types::Identity;

/// The verified identity of the caller.
///
/// Only available behind [`authorize`](crate::middleware::authorize); on a
/// public route there is no principal and the extractor rejects with 401.
#[derive(Debug, Clone)]
pub struct Principal(pub Arc<Identity>);

impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or(AuthError::NoCredentialsSupplied)
    }
}

/// The caller's identity, if one was resolved.
#[derive(Debug, Clone)]
pub struct OptionalPrincipal(pub Option<Arc<Identity>>);

impl<S> FromRequestParts<S> for OptionalPrincipal
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(
            parts
                .extensions
                .get::<Principal>()
                .map(|principal| Arc::clone(&principal.0)),
        ))
    }
}
