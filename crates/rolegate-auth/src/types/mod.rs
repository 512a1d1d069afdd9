//! Common types used across the authentication and authorization modules.
//!
//! ## Domain Types
//!
//! - [`Role`] - Role identifier ordered by the role hierarchy
//! - [`Identity`] - Verified principal with its directly assigned roles
//! - [`Credentials`] - Username/password pair supplied with a request

pub mod credentials;
pub mod identity;
pub mod role;

pub use credentials::Credentials;
pub use identity::Identity;
pub use role::Role;
