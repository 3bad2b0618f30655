//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (structured fields, request/session ids)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log output (stdout, RUST_LOG-filtered)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Session ids flow through every log line touching a tunnel
//! - Metric updates are cheap (atomic increments), safe on the data path

pub mod metrics;
