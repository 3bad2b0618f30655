//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tunnel_upload_chunks_total` (counter): accepted upload chunks
//! - `tunnel_upload_bytes_total` (counter): bytes written to destinations
//! - `tunnel_download_bytes_total` (counter): bytes streamed back to callers
//! - `tunnel_rejections_total{kind}` (counter): rejected requests by kind
//! - `tunnel_sessions_evicted_total` (counter): idle sessions reaped
//! - `tunnel_active_sessions` (gauge): live registry entries
//! - `tunnel_sweep_duration_seconds` (histogram): reaper sweep latency

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_upload_chunk(bytes: usize) {
    counter!("tunnel_upload_chunks_total").increment(1);
    counter!("tunnel_upload_bytes_total").increment(bytes as u64);
}

pub fn record_download_read(bytes: usize) {
    counter!("tunnel_download_bytes_total").increment(bytes as u64);
}

pub fn record_rejection(kind: &'static str) {
    counter!("tunnel_rejections_total", "kind" => kind).increment(1);
}

pub fn record_sweep(evicted: usize, active: usize, duration: Duration) {
    counter!("tunnel_sessions_evicted_total").increment(evicted as u64);
    gauge!("tunnel_active_sessions").set(active as f64);
    histogram!("tunnel_sweep_duration_seconds").record(duration.as_secs_f64());
}
