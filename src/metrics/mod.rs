//! Prometheus metrics for the prediction service.
//!
//! Metrics live in a crate-global registry and are exported in text format on
//! `/metrics`:
//! - HTTP request counts, latency and in-flight requests
//! - Predictions per variant and label, and scoring latency
//! - Artifact load attempts
//! - Errors by error code
//!
//! # Example
//! ```no_run
//! use spam_detection_api::metrics::PREDICTIONS_TOTAL;
//!
//! PREDICTIONS_TOTAL
//!     .with_label_values(&["vectorizer", "spam"])
//!     .inc();
//! ```

mod middleware;

pub use middleware::{MetricsLayer, MetricsMiddleware, MetricsService};

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
};

const NAMESPACE: &str = "spam_api";

lazy_static! {
    /// Global Prometheus registry for all metrics
    pub static ref PROMETHEUS_REGISTRY: Registry = Registry::new();

    // ============================================================================
    // HTTP Metrics
    // ============================================================================

    /// Total number of HTTP requests received
    ///
    /// Labels: method, path, status_code
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests")
            .namespace(NAMESPACE),
        &["method", "path", "status_code"]
    ).expect("Failed to create HTTP_REQUESTS_TOTAL metric");

    /// HTTP request duration in seconds
    ///
    /// Labels: method, path
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["method", "path"]
    ).expect("Failed to create HTTP_REQUEST_DURATION_SECONDS metric");

    /// Number of HTTP requests currently being served
    pub static ref HTTP_REQUESTS_IN_FLIGHT: Gauge = Gauge::with_opts(
        Opts::new("http_requests_in_flight", "Number of HTTP requests being served")
            .namespace(NAMESPACE)
    ).expect("Failed to create HTTP_REQUESTS_IN_FLIGHT metric");

    // ============================================================================
    // Prediction Metrics
    // ============================================================================

    /// Total number of predictions served
    ///
    /// Labels: variant, label
    pub static ref PREDICTIONS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("predictions_total", "Total number of predictions served")
            .namespace(NAMESPACE),
        &["variant", "label"]
    ).expect("Failed to create PREDICTIONS_TOTAL metric");

    /// Time spent vectorizing and scoring one message
    ///
    /// Labels: variant
    pub static ref PREDICTION_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "prediction_duration_seconds",
            "Time spent scoring a single message in seconds"
        )
        .namespace(NAMESPACE)
        .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
        &["variant"]
    ).expect("Failed to create PREDICTION_DURATION_SECONDS metric");

    /// Artifact load attempts
    ///
    /// Labels: outcome (success, failure)
    pub static ref ARTIFACT_LOADS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("artifact_loads_total", "Total number of artifact load attempts")
            .namespace(NAMESPACE),
        &["outcome"]
    ).expect("Failed to create ARTIFACT_LOADS_TOTAL metric");

    // ============================================================================
    // Error Metrics
    // ============================================================================

    /// Total number of error responses
    ///
    /// Labels: error_code
    pub static ref ERRORS_TOTAL: CounterVec = CounterVec::new(
        Opts::new("errors_total", "Total number of error responses")
            .namespace(NAMESPACE),
        &["error_code"]
    ).expect("Failed to create ERRORS_TOTAL metric");

    /// Application build info
    ///
    /// Labels: version
    pub static ref BUILD_INFO: GaugeVec = GaugeVec::new(
        Opts::new("build_info", "Application build information")
            .namespace(NAMESPACE),
        &["version"]
    ).expect("Failed to create BUILD_INFO metric");
}

/// Initialize the Prometheus metrics registry
///
/// Registers all metrics with the global registry. Call once at startup;
/// a second call fails with `AlreadyReg`.
pub fn init_metrics() -> Result<(), prometheus::Error> {
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(PREDICTIONS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(PREDICTION_DURATION_SECONDS.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(ARTIFACT_LOADS_TOTAL.clone()))?;

    PROMETHEUS_REGISTRY.register(Box::new(ERRORS_TOTAL.clone()))?;
    PROMETHEUS_REGISTRY.register(Box::new(BUILD_INFO.clone()))?;

    BUILD_INFO
        .with_label_values(&[env!("CARGO_PKG_VERSION")])
        .set(1.0);

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Generate Prometheus text format metrics
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = PROMETHEUS_REGISTRY.gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}
