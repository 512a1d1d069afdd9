//! HTTP middleware for authentication and authorization.
//!
//! - [`authorize`] runs every request through the engine, sets token cookies
//!   and either forwards the request (with a [`Principal`](crate::extractors::Principal)
//!   extension) or answers with a uniform denial
//! - [`AccessDenied`] renders that denial
//!
//! # Example
//!
//! ```ignore
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use rolegate_auth::middleware::{AuthState, authorize};
//!
//! let auth = AuthState::from_config(engine, &config)
//!     .with_operation("/api/testEdit", "api.testEdit");
//!
//! let app = Router::new()
//!     .route("/api/testEdit", get(test_edit))
//!     .layer(from_fn_with_state(auth.clone(), authorize))
//!     .with_state(auth);
//! ```

pub mod auth;
pub mod error;

pub use auth::{AccessOutcome, AuthState, CookieSettings, authorize};
pub use error::AccessDenied;
