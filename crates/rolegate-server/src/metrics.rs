//! Prometheus metrics for the Rolegate server.
//!
//! This module provides:
//! - HTTP request metrics (count, latency)
//! - Authorization decision counts by outcome and identity source
//! - Identity cache metrics (hits, misses, entries)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rolegate_auth::{AccessOutcome, CacheStats};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    // Authorization metrics
    pub const AUTHZ_DECISIONS_TOTAL: &str = "authz_decisions_total";

    // Identity cache metrics
    pub const IDENTITY_CACHE_HITS_TOTAL: &str = "identity_cache_hits_total";
    pub const IDENTITY_CACHE_MISSES_TOTAL: &str = "identity_cache_misses_total";
    pub const IDENTITY_CACHE_EVICTIONS_TOTAL: &str = "identity_cache_evictions_total";
    pub const IDENTITY_CACHE_ENTRIES: &str = "identity_cache_entries";
    pub const IDENTITY_CACHE_REVOKED: &str = "identity_cache_revoked_tokens";
}

/// Label used for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Initialize the Prometheus metrics exporter.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    // Pull-based: the scrape endpoint renders the handle itself
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

// =============================================================================
// HTTP Metrics
// =============================================================================

/// Record an HTTP request.
///
/// `route` is the matched route template, so the label set stays bounded.
pub fn record_http_request(method: &str, route: &str, status: u16, duration: Duration) {
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_string(),
        "path" => route.to_string(),
        "status" => status.to_string(),
        "status_class" => status_class(status)
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "path" => route.to_string()
    )
    .record(duration.as_secs_f64());
}

fn status_class(status: u16) -> &'static str {
    match status {
        200..=299 => "2xx",
        300..=399 => "3xx",
        400..=499 => "4xx",
        500..=599 => "5xx",
        _ => "other",
    }
}

// =============================================================================
// Authorization Metrics
// =============================================================================

/// Record an authorization decision.
pub fn record_decision(outcome: &AccessOutcome) {
    counter!(
        names::AUTHZ_DECISIONS_TOTAL,
        "decision" => outcome.decision,
        "source" => outcome.source.as_str()
    )
    .increment(1);
}

// =============================================================================
// Identity Cache Metrics
// =============================================================================

/// Publish a snapshot of the identity cache counters.
pub fn record_cache_stats(stats: &CacheStats) {
    counter!(names::IDENTITY_CACHE_HITS_TOTAL).absolute(stats.hits);
    counter!(names::IDENTITY_CACHE_MISSES_TOTAL).absolute(stats.misses);
    counter!(names::IDENTITY_CACHE_EVICTIONS_TOTAL).absolute(stats.evictions);
    gauge!(names::IDENTITY_CACHE_ENTRIES).set(stats.size as f64);
    gauge!(names::IDENTITY_CACHE_REVOKED).set(stats.revoked as f64);
}
