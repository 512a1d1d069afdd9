//! Storage traits for authentication data.
//!
//! The credential store is an external collaborator: the engine only needs
//! to look up a user's stored password hash and directly assigned roles.
//! [`InMemoryUserStore`] is the bundled implementation, seeded from
//! configuration at startup.

pub mod user;

pub use user::{InMemoryUserStore, StoredUser, UserStorage};
