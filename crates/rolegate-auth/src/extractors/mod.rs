//! Axum extractors for request credentials and the resolved principal.
//!
//! - [`parse_basic_auth`] / [`basic_credentials`] read HTTP Basic credentials
//! - [`Principal`] yields the identity the authorization middleware resolved
//! - [`OptionalPrincipal`] does the same for routes that may be public
//!
//! ```ignore
//! use rolegate_auth::extractors::Principal;
//!
//! async fn handler(Principal(identity): Principal) -> String {
//!     format!("Hello, {}!", identity.username)
//! }
//! ```

mod basic_auth;
mod principal;

pub use basic_auth::{basic_credentials, parse_basic_auth};
pub use principal::{OptionalPrincipal, Principal};
