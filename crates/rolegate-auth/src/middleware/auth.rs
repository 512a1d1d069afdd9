//! Authorization middleware.
//!
//! The middleware builds an [`AccessRequest`] from the incoming request
//! (Basic header, token cookies, `remember-me` query parameter and the
//! operation id of the matched route), asks the engine for a decision and
//! applies it.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{MatchedPath, Query, Request, State},
    http::{HeaderMap, Method, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};

use crate::config::AuthConfig;
use crate::engine::{AccessDecision, AccessRequest, AuthorizationEngine, IdentitySource};
use crate::extractors::{Principal, basic_credentials};
use crate::token::{Token, TokenKind};
use crate::{audit, middleware::error::AccessDenied};

// =============================================================================
// Auth State
// =============================================================================

/// Cookie and challenge settings.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    /// Realm announced in `WWW-Authenticate`.
    pub realm: Arc<str>,
    /// Cookie carrying the session token.
    pub session_cookie: String,
    /// Cookie carrying the persistent token.
    pub remember_me_cookie: String,
    /// Query parameter requesting a persistent token.
    pub remember_me_parameter: String,
    /// Mark cookies `Secure`.
    pub secure: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self::from_config(&AuthConfig::default())
    }
}

impl CookieSettings {
    /// Reads cookie settings from the auth configuration.
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            realm: config.realm.as_str().into(),
            session_cookie: config.session.cookie_name.clone(),
            remember_me_cookie: config.remember_me.cookie_name.clone(),
            remember_me_parameter: config.remember_me.parameter.clone(),
            secure: config.session.secure_cookies,
        }
    }
}

/// State shared by the middleware and the logout handler.
///
/// Include it in the application state and expose it via `FromRef`.
#[derive(Debug, Clone)]
pub struct AuthState {
    /// The authorization engine.
    pub engine: Arc<AuthorizationEngine>,
    /// Cookie settings.
    pub cookies: Arc<CookieSettings>,
    /// Route template → operation id.
    operations: Arc<HashMap<String, String>>,
}

impl AuthState {
    /// Creates a state with default cookie settings.
    pub fn new(engine: Arc<AuthorizationEngine>) -> Self {
        Self {
            engine,
            cookies: Arc::new(CookieSettings::default()),
            operations: Arc::new(HashMap::new()),
        }
    }

    /// Creates a state with cookie settings taken from the configuration.
    pub fn from_config(engine: Arc<AuthorizationEngine>, config: &AuthConfig) -> Self {
        Self {
            cookies: Arc::new(CookieSettings::from_config(config)),
            ..Self::new(engine)
        }
    }

    /// Associates a route template (as registered with the router) with an
    /// operation id, so the operation-level rule is applied to it.
    #[must_use]
    pub fn with_operation(mut self, route: impl Into<String>, operation: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.operations).insert(route.into(), operation.into());
        self
    }

    /// Operation id registered for a route template.
    pub fn operation_for(&self, route: &str) -> Option<&str> {
        self.operations.get(route).map(String::as_str)
    }

    /// Builds the engine input for a request.
    pub fn access_request(
        &self,
        method: &Method,
        uri: &Uri,
        headers: &HeaderMap,
        jar: &CookieJar,
        route: Option<&str>,
    ) -> AccessRequest {
        AccessRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            operation: route.and_then(|route| self.operation_for(route)).map(str::to_owned),
            credentials: basic_credentials(headers),
            session_token: cookie_value(jar, &self.cookies.session_cookie),
            remember_me_token: cookie_value(jar, &self.cookies.remember_me_cookie),
            remember_me_requested: self.remember_me_requested(uri),
        }
    }

    fn remember_me_requested(&self, uri: &Uri) -> bool {
        let Ok(Query(params)) = Query::<HashMap<String, String>>::try_from_uri(uri) else {
            return false;
        };
        params
            .get(&self.cookies.remember_me_parameter)
            .is_some_and(|value| {
                matches!(
                    value.to_ascii_lowercase().as_str(),
                    "true" | "on" | "yes" | "1"
                )
            })
    }

    /// Cookie conveying an issued token.
    pub fn token_cookie(&self, token: &Token) -> Cookie<'static> {
        let name = match token.kind {
            TokenKind::Session => self.cookies.session_cookie.clone(),
            TokenKind::Persistent => self.cookies.remember_me_cookie.clone(),
        };
        let mut builder = Cookie::build((name, token.value.clone()))
            .http_only(true)
            .secure(self.cookies.secure)
            .same_site(SameSite::Lax)
            .path("/");
        if let Some(max_age) = token.max_age {
            let seconds = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
            builder = builder.max_age(time::Duration::seconds(seconds));
        }
        builder.build()
    }

    /// Adds cookies for every issued token.
    pub fn add_token_cookies(&self, jar: CookieJar, tokens: &[Token]) -> CookieJar {
        tokens
            .iter()
            .fold(jar, |jar, token| jar.add(self.token_cookie(token)))
    }

    /// Expires both token cookies.
    pub fn clear_token_cookies(&self, jar: CookieJar) -> CookieJar {
        [&self.cookies.session_cookie, &self.cookies.remember_me_cookie]
            .into_iter()
            .fold(jar, |jar, name| {
                jar.remove(Cookie::build(name.clone()).path("/"))
            })
    }
}

fn cookie_value(jar: &CookieJar, name: &str) -> Option<String> {
    jar.get(name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|value| !value.is_empty())
}

// =============================================================================
// Outcome
// =============================================================================

/// Summary of the decision, attached to the response extensions for outer
/// layers (metrics, access logs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessOutcome {
    /// `authorized` or `denied`.
    pub decision: &'static str,
    /// Where the identity came from.
    pub source: IdentitySource,
    /// `granted` or `<category>:<reason code>`.
    pub reason: String,
}

impl AccessOutcome {
    fn of(decision: &AccessDecision) -> Self {
        Self {
            decision: if decision.is_authorized() {
                "authorized"
            } else {
                "denied"
            },
            source: decision.source,
            reason: audit::reason_label(decision),
        }
    }
}

// =============================================================================
// Middleware
// =============================================================================

/// Authorizes a request.
///
/// Apply with `axum::middleware::from_fn_with_state` as a router-wide layer,
/// so unmatched paths are covered too.
pub async fn authorize(
    State(auth): State<AuthState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned());
    let access = auth.access_request(
        request.method(),
        request.uri(),
        request.headers(),
        &jar,
        route.as_deref(),
    );

    let decision = auth.engine.decide(&access).await;
    let outcome = AccessOutcome::of(&decision);
    let jar = auth.add_token_cookies(jar, &decision.issued);

    let mut response = if decision.is_authorized() {
        if let Some(identity) = decision.identity {
            request.extensions_mut().insert(Principal(identity));
        }
        let response = next.run(request).await;
        (jar, response).into_response()
    } else {
        let denied = AccessDenied::new(
            Arc::clone(&auth.cookies.realm),
            decision.identity.is_some(),
        );
        (jar, denied).into_response()
    };

    response.extensions_mut().insert(outcome);
    response
}
