//! Prometheus metrics for tailgate

use crate::error::{Result, TailgateError};
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, TextEncoder, register_counter, register_counter_vec,
    register_gauge,
};
use std::sync::OnceLock;

/// Global metrics instance
static METRICS: OnceLock<Metrics> = OnceLock::new();

/// All tailgate metrics
pub struct Metrics {
    /// Raw lines read from sources (by host)
    pub lines_read: CounterVec,

    /// Lines dropped by the parser (by host)
    pub parse_failures: CounterVec,

    /// Hits appended to the buffer (by host)
    pub hits_ingested: CounterVec,

    /// Hits evicted by the retention window
    pub hits_evicted: Counter,

    /// Poll requests served
    pub polls: Counter,

    /// Current number of buffered hits
    pub buffer_size: Gauge,
}

impl Metrics {
    /// Initialize metrics (call once at startup)
    pub fn init() -> Result<&'static Metrics> {
        if let Some(metrics) = METRICS.get() {
            return Ok(metrics);
        }

        let metrics = Metrics {
            lines_read: register_counter_vec!(
                "tailgate_lines_read_total",
                "Raw lines read from line sources",
                &["host"]
            )
            .map_err(|e| TailgateError::Metrics(format!("lines_read: {e}")))?,

            parse_failures: register_counter_vec!(
                "tailgate_parse_failures_total",
                "Lines dropped because they did not parse",
                &["host"]
            )
            .map_err(|e| TailgateError::Metrics(format!("parse_failures: {e}")))?,

            hits_ingested: register_counter_vec!(
                "tailgate_hits_ingested_total",
                "Hits appended to the sliding buffer",
                &["host"]
            )
            .map_err(|e| TailgateError::Metrics(format!("hits_ingested: {e}")))?,

            hits_evicted: register_counter!(
                "tailgate_hits_evicted_total",
                "Hits evicted by the retention window"
            )
            .map_err(|e| TailgateError::Metrics(format!("hits_evicted: {e}")))?,

            polls: register_counter!("tailgate_polls_total", "Poll requests served")
                .map_err(|e| TailgateError::Metrics(format!("polls: {e}")))?,

            buffer_size: register_gauge!(
                "tailgate_buffer_size",
                "Current number of hits in the sliding buffer"
            )
            .map_err(|e| TailgateError::Metrics(format!("buffer_size: {e}")))?,
        };

        let _ = METRICS.set(metrics);

        METRICS
            .get()
            .ok_or_else(|| TailgateError::Metrics("failed to initialize metrics".to_string()))
    }

    /// Get the global metrics instance, if initialized.
    pub fn get() -> Option<&'static Metrics> {
        METRICS.get()
    }
}

/// Gather all metrics and encode as Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_ok() {
        String::from_utf8(buffer).unwrap_or_default()
    } else {
        String::new()
    }
}

/// Record a raw line read, if metrics are initialized.
pub fn try_count_line(host: &str) {
    if let Some(m) = Metrics::get() {
        m.lines_read.with_label_values(&[host]).inc();
    }
}

/// Record a parse failure, if metrics are initialized.
pub fn try_count_parse_failure(host: &str) {
    if let Some(m) = Metrics::get() {
        m.parse_failures.with_label_values(&[host]).inc();
    }
}

/// Record an ingested hit, if metrics are initialized.
pub fn try_count_hit(host: &str) {
    if let Some(m) = Metrics::get() {
        m.hits_ingested.with_label_values(&[host]).inc();
    }
}

/// Record window evictions, if metrics are initialized.
pub fn try_count_evicted(count: u64) {
    if count > 0
        && let Some(m) = Metrics::get()
    {
        m.hits_evicted.inc_by(count as f64);
    }
}

/// Record a served poll, if metrics are initialized.
pub fn try_count_poll() {
    if let Some(m) = Metrics::get() {
        m.polls.inc();
    }
}

/// Update the buffer size gauge, if metrics are initialized.
pub fn try_set_buffer_size(size: usize) {
    if let Some(m) = Metrics::get() {
        m.buffer_size.set(size as f64);
    }
}
