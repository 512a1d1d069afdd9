//! Axum HTTP handlers provided by the auth module.

pub mod logout;

pub use logout::logout_handler;
