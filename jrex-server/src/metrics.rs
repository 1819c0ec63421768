//! Dispatcher metrics
//!
//! OpenTelemetry instruments recorded by `JsonRpcServer` when metrics are
//! enabled through the builder. All names are prefixed with `jrex.server.`.
//!
//! # Metrics Collected
//!
//! - **requests_total**: requests that reached an operation lookup (counter)
//! - **request_duration**: time from document receipt to response, in seconds (histogram)
//! - **notifications_total**: requests whose response was suppressed (counter)
//! - **errors_total**: error responses and captured failures, by code (counter)
//!
//! # Examples
//!
//! ```rust,no_run
//! use jrex_server::ServerMetrics;
//!
//! let metrics = ServerMetrics::new("ledger");
//! metrics.record_request("transfer", "success", 0.004);
//! metrics.record_error(-32602);
//! ```

use opentelemetry::{
    global,
    metrics::{Counter, Histogram, Meter},
    KeyValue,
};

/// Server metrics for monitoring
pub struct ServerMetrics {
    /// Total number of requests processed
    pub requests_total: Counter<u64>,
    /// Request processing duration in seconds
    pub request_duration: Histogram<f64>,
    /// Total number of notifications (responses suppressed)
    pub notifications_total: Counter<u64>,
    /// Total number of errors, by JSON-RPC code
    pub errors_total: Counter<u64>,
}

impl ServerMetrics {
    /// Create metrics on the global meter provider
    pub fn new(service_name: impl Into<String>) -> Self {
        let name: &'static str = Box::leak(service_name.into().into_boxed_str());
        let meter = global::meter(name);
        Self::new_with_meter(&meter)
    }

    /// Create metrics on a specific meter
    pub fn new_with_meter(meter: &Meter) -> Self {
        Self {
            requests_total: meter
                .u64_counter("jrex.server.requests.total")
                .with_description("Total number of requests processed")
                .build(),
            request_duration: meter
                .f64_histogram("jrex.server.request.duration")
                .with_description("Request processing duration in seconds")
                .build(),
            notifications_total: meter
                .u64_counter("jrex.server.notifications.total")
                .with_description("Total number of notifications handled without a response")
                .build(),
            errors_total: meter
                .u64_counter("jrex.server.errors.total")
                .with_description("Total number of errors encountered")
                .build(),
        }
    }

    /// Record a handled request
    pub fn record_request(&self, method: &str, status: &str, duration_secs: f64) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("status", status.to_string()),
        ];
        self.requests_total.add(1, attributes);
        self.request_duration.record(duration_secs, attributes);
    }

    /// Record a suppressed response
    pub fn record_notification(&self, method: &str) {
        self.notifications_total
            .add(1, &[KeyValue::new("method", method.to_string())]);
    }

    /// Record an error by code
    pub fn record_error(&self, code: i32) {
        self.errors_total.add(1, &[KeyValue::new("code", i64::from(code))]);
    }
}

impl std::fmt::Debug for ServerMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerMetrics").finish_non_exhaustive()
    }
}
