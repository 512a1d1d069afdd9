use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use rolegate_auth::AccessOutcome;
use uuid::Uuid;

use crate::metrics;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

// Request ID middleware: propagates X-Request-Id or generates a UUID v4 if missing.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    // Preserve an incoming request id; the uuid string is always a valid header value
    let req_id_value = req
        .headers()
        .get(&header_name)
        .cloned()
        .or_else(|| HeaderValue::from_str(&Uuid::new_v4().to_string()).ok());

    let Some(req_id_value) = req_id_value else {
        return next.run(req).await;
    };

    // Downstream spans read it from the extensions
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(header_name, req_id_value);
    res
}

// Records request and authorization metrics. Must wrap the authorization layer
// so the `AccessOutcome` it attaches is visible here.
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().clone();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_owned());

    let res = next.run(req).await;

    metrics::record_http_request(
        method.as_str(),
        route.as_deref().unwrap_or(metrics::UNMATCHED_ROUTE),
        res.status().as_u16(),
        started.elapsed(),
    );
    if let Some(outcome) = res.extensions().get::<AccessOutcome>() {
        metrics::record_decision(outcome);
    }
    res
}
