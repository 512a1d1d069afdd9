//! Logout endpoint.
//!
//! `POST /logout` invalidates the session and persistent tokens presented
//! as cookies and expires both cookies. It always succeeds, so it can be
//! called with stale or missing cookies.

use axum::{extract::State, http::StatusCode};
use axum_extra::extract::CookieJar;

use crate::middleware::AuthState;

/// Handles `POST /logout`.
pub async fn logout_handler(
    State(auth): State<AuthState>,
    jar: CookieJar,
) -> (CookieJar, StatusCode) {
    let session = jar
        .get(&auth.cookies.session_cookie)
        .map(|cookie| cookie.value().to_owned());
    let remember_me = jar
        .get(&auth.cookies.remember_me_cookie)
        .map(|cookie| cookie.value().to_owned());

    let invalidated = auth
        .engine
        .logout(session.as_deref(), remember_me.as_deref());
    tracing::info!(invalidated, "User logged out");

    (auth.clear_token_cookies(jar), StatusCode::NO_CONTENT)
}
