//! Prometheus metrics
//!
//! Collectors live in a process-wide registry and are rendered by the
//! `/metrics` handler in the text exposition format.
//!
//! Author: hephaex@gmail.com

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("docent_http_requests_total", "HTTP requests by endpoint and status"),
        &["endpoint", "status"]
    )
    .expect("valid metric definition");

    pub static ref HTTP_REQUEST_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "docent_http_request_duration_seconds",
            "HTTP request latency by endpoint"
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
        &["endpoint"]
    )
    .expect("valid metric definition");

    pub static ref AUTH_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("docent_auth_failures_total", "Authentication failures by kind"),
        &["kind"]
    )
    .expect("valid metric definition");

    pub static ref SESSIONS_RENEWED_TOTAL: IntCounter = IntCounter::new(
        "docent_sessions_renewed_total",
        "Access tokens renewed by the boundary guard"
    )
    .expect("valid metric definition");

    pub static ref REFRESH_TOKENS_PURGED_TOTAL: IntCounter = IntCounter::new(
        "docent_refresh_tokens_purged_total",
        "Expired refresh tokens deleted by the sweeper"
    )
    .expect("valid metric definition");

    pub static ref UPTIME_SECONDS: IntGauge =
        IntGauge::new("docent_uptime_seconds", "Time since server start")
            .expect("valid metric definition");
}

/// Register every collector with [`REGISTRY`]. Safe to call more than once.
pub fn register_metrics() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(HTTP_REQUESTS_TOTAL.clone()),
            Box::new(HTTP_REQUEST_DURATION.clone()),
            Box::new(AUTH_FAILURES_TOTAL.clone()),
            Box::new(SESSIONS_RENEWED_TOTAL.clone()),
            Box::new(REFRESH_TOKENS_PURGED_TOTAL.clone()),
            Box::new(UPTIME_SECONDS.clone()),
        ];
        for collector in collectors {
            if let Err(e) = REGISTRY.register(collector) {
                tracing::warn!(error = %e, "Failed to register metric");
            }
        }

        #[cfg(target_os = "linux")]
        if let Err(e) = REGISTRY.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        )) {
            tracing::warn!(error = %e, "Failed to register process metrics");
        }
    });
}

pub fn record_auth_failure(kind: &str) {
    AUTH_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

/// Render the registry in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    register_metrics();
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_auth_failures() {
        record_auth_failure("malformed");
        let text = render().unwrap();
        assert!(text.contains("docent_auth_failures_total{kind=\"malformed\"}"));
    }

    #[test]
    fn test_register_twice_is_harmless() {
        register_metrics();
        register_metrics();
        assert!(render().is_ok());
    }
}
