//! Decision logging.
//!
//! Every decision produces exactly one event on the `rolegate::audit` target
//! carrying the resolved user and the reason, never credentials or tokens.

use crate::engine::{AccessDecision, AccessRequest, RequestState};
use crate::error::AuthError;

/// Audit log target.
pub const TARGET: &str = "rolegate::audit";

/// Reason label for a decision: `granted`, or `<category>:<reason code>`.
pub fn reason_label(decision: &AccessDecision) -> String {
    match &decision.denial {
        None => "granted".to_string(),
        Some(err) => denial_label(err),
    }
}

fn denial_label(err: &AuthError) -> String {
    format!("{}:{}", err.category(), err.reason_code())
}

/// Emits the audit event for a decision.
pub fn record_decision(request: &AccessRequest, decision: &AccessDecision) {
    let user = decision.username().unwrap_or("-");
    let reason = reason_label(decision);

    match (&decision.state, &decision.denial) {
        (RequestState::Authorized, _) => tracing::info!(
            target: TARGET,
            method = %request.method,
            path = %request.path,
            user = %user,
            source = %decision.source,
            decision = "authorized",
            reason = %reason,
            "Access granted"
        ),
        (_, Some(err)) if err.is_server_error() => tracing::error!(
            target: TARGET,
            method = %request.method,
            path = %request.path,
            user = %user,
            source = %decision.source,
            decision = "denied",
            reason = %reason,
            error = %err,
            "Access denied by internal failure"
        ),
        _ => tracing::warn!(
            target: TARGET,
            method = %request.method,
            path = %request.path,
            user = %user,
            source = %decision.source,
            decision = "denied",
            reason = %reason,
            "Access denied"
        ),
    }
}
