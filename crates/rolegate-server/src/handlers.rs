use axum::{
    Json,
    http::{StatusCode, header},
    response::IntoResponse,
};
use rolegate_auth::{OptionalPrincipal, Principal};
use serde::Serialize;

use crate::metrics;

/// Body of the demonstration API endpoints.
#[derive(Debug, Serialize)]
pub struct BarResponse<'a> {
    bar: &'a str,
}

/// `GET /api/testView`, operation `api.testView`.
pub async fn test_view(Principal(identity): Principal) -> impl IntoResponse {
    tracing::info!(user = %identity.username, "view endpoint invoked");
    (StatusCode::OK, Json(BarResponse { bar: "view" }))
}

/// `GET /api/testEdit`, operation `api.testEdit`.
pub async fn test_edit(Principal(identity): Principal) -> impl IntoResponse {
    tracing::info!(user = %identity.username, "edit endpoint invoked");
    (StatusCode::OK, Json(BarResponse { bar: "edit" }))
}

/// `GET /api/testUnsecuredMethod`, operation `api.testUnsecured`.
pub async fn test_unsecured(Principal(identity): Principal) -> impl IntoResponse {
    tracing::info!(user = %identity.username, "unsecured endpoint invoked");
    (
        StatusCode::OK,
        Json(BarResponse {
            bar: "i'm unsecured!!",
        }),
    )
}

/// `GET /admin/test`, operation `admin.test`.
pub async fn admin_test(Principal(identity): Principal) -> impl IntoResponse {
    tracing::info!(user = %identity.username, "admin endpoint invoked");
    (StatusCode::OK, "admin")
}

/// `GET /actuator/prometheus`
pub async fn prometheus(OptionalPrincipal(caller): OptionalPrincipal) -> impl IntoResponse {
    tracing::debug!(
        scraper = caller.as_deref().map_or("anonymous", |identity| identity.username.as_str()),
        "metrics scraped"
    );
    match metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics are disabled").into_response(),
    }
}
