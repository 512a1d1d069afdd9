//! HTTP Basic credential parsing.

use axum::http::{HeaderMap, header::AUTHORIZATION};
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::types::Credentials;

/// Parses an `Authorization: Basic <base64(user:password)>` value.
///
/// The scheme is matched case-insensitively. The password may contain `:`.
pub fn parse_basic_auth(header: &str) -> Result<Credentials, String> {
    let (scheme, encoded) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| "Authorization header must start with 'Basic '".to_string())?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err("Authorization header must start with 'Basic '".to_string());
    }

    let decoded = STANDARD
        .decode(encoded.trim())
        .map_err(|_| "Invalid base64 encoding in Authorization header".to_string())?;

    let decoded = String::from_utf8(decoded)
        .map_err(|_| "Invalid UTF-8 in decoded credentials".to_string())?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| "Credentials must be in format 'username:password'".to_string())?;

    if username.is_empty() {
        return Err("Username must not be empty".to_string());
    }

    Ok(Credentials::new(username, password))
}

/// Extracts Basic credentials from request headers.
///
/// A missing or malformed header yields `None`: the request is then treated
/// as carrying no credentials at all.
pub fn basic_credentials(headers: &HeaderMap) -> Option<Credentials> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    match parse_basic_auth(header) {
        Ok(credentials) => Some(credentials),
        Err(reason) => {
            tracing::debug!(reason = %reason, "Ignoring malformed Authorization header");
            None
        }
    }
}
