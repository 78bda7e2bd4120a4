//! Metrics definitions for the stash service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `stash_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: HTTP methods
//! - `endpoint`: known routes, everything else is `/other`
//! - `status`: success, error, timeout (plus JWKS fetch failure labels)
//! - `result`: hit, miss
//! - `operation`: bounded by code (upsert_user, list_links, ...)
//! - `error_type`: bounded by `AuthError` variants

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if Prometheus recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("stash_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // JWKS fetches include retry backoff, so the tail is long
        .set_buckets_for_metric(
            Matcher::Prefix("stash_jwks_fetch".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("stash_token_validation".to_string()),
            &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.500, 1.000, 5.000],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("stash_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `stash_http_requests_total`, `stash_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status`
///
/// Captures framework-level responses (404, 405, 415) as well as handler output.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("stash_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("stash_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion.
///
/// Query strings are not part of the path, so `?teamId=` never reaches here.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/api/v1/me" => "/api/v1/me",
        "/api/v1/links" => "/api/v1/links",
        _ => "/other",
    }
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a single JWKS fetch attempt.
///
/// Metric: `stash_jwks_fetch_total`, `stash_jwks_fetch_duration_seconds`
/// Labels: `status` (success, transport, status, parse, timeout)
pub fn record_jwks_fetch(status: &'static str, duration: Duration) {
    histogram!("stash_jwks_fetch_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("stash_jwks_fetch_total",
        "status" => status
    )
    .increment(1);
}

/// Record a JWKS cache lookup.
///
/// Metric: `stash_jwks_cache_total`
/// Labels: `result` (hit, miss)
pub fn record_jwks_cache(result: &'static str) {
    counter!("stash_jwks_cache_total",
        "result" => result
    )
    .increment(1);
}

// ============================================================================
// Token Validation Metrics
// ============================================================================

/// Record a token validation outcome.
///
/// Metric: `stash_token_validations_total`, `stash_token_validation_duration_seconds`
/// Labels: `status` (success, error), `error_type` (`AuthError::kind()` or "none")
pub fn record_token_validation(status: &'static str, error_type: Option<&'static str>, duration: Duration) {
    let error_type = error_type.unwrap_or("none");

    histogram!("stash_token_validation_duration_seconds",
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("stash_token_validations_total",
        "status" => status,
        "error_type" => error_type
    )
    .increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `stash_db_query_duration_seconds`, `stash_db_queries_total`
/// Labels: `operation`, `status`
///
/// Operations: upsert_user, get_user, list_links, create_link, ping
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("stash_db_query_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("stash_db_queries_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}
