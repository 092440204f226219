//! Prometheus metrics helpers for the Vellum service.
//!
//! Centralized recorder initialization plus the counters shared across the
//! request pipeline and the counter stores.
//!
//! # Metric Naming Conventions
//!
//! - Prefix: `vellum_`
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: used sparingly to avoid cardinality explosion (route class
//!   and status code, never raw paths or IPs)

use axum::{routing::get, Router};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// Must be called once at startup before any metrics are recorded.
/// Returns a handle for [`start_metrics_server`].
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_common_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already
/// installed instead of panicking. Useful for tests.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// Start the Prometheus metrics HTTP server.
///
/// Serves `/metrics` on the given port from a background task and returns
/// immediately.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "metrics server exited");
        }
    });

    Ok(())
}

fn register_common_metrics() {
    describe_counter!(
        "vellum_http_requests_total",
        "HTTP requests handled, by method and status"
    );
    describe_counter!(
        "vellum_rate_limited_total",
        "Requests rejected by the rate limiter, by route class"
    );
    describe_counter!(
        "vellum_cache_hits_total",
        "Response cache hits, by cache name"
    );
    describe_counter!(
        "vellum_cache_misses_total",
        "Response cache misses, by cache name"
    );
    describe_counter!(
        "vellum_store_writes_total",
        "Counter-store file writes, by store"
    );
    describe_counter!(
        "vellum_security_events_total",
        "Security log events, by severity"
    );
}

/// Record a completed HTTP request.
pub fn record_request(method: &str, status: u16) {
    counter!(
        "vellum_http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
    )
    .increment(1);
}

/// Record a rate-limit rejection for a route class.
pub fn record_rate_limited(class: &'static str) {
    counter!("vellum_rate_limited_total", "class" => class).increment(1);
}

/// Record a hit on a named cache.
pub fn record_cache_hit(cache: &'static str) {
    counter!("vellum_cache_hits_total", "cache" => cache).increment(1);
}

/// Record a miss on a named cache.
pub fn record_cache_miss(cache: &'static str) {
    counter!("vellum_cache_misses_total", "cache" => cache).increment(1);
}

/// Record a durable write by a counter store.
pub fn record_store_write(store: &'static str) {
    counter!("vellum_store_writes_total", "store" => store).increment(1);
}

/// Record a security log event.
pub fn record_security_event(severity: &'static str) {
    counter!("vellum_security_events_total", "severity" => severity).increment(1);
}
