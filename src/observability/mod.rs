//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - The binary installs the subscriber and exporter once; library code only emits
//! - Metric calls are no-ops until a recorder is installed, so tests need no setup
//! - Request ID flows through every proxy log line

pub mod logging;
pub mod metrics;
