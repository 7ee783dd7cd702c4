//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Wrapped sinks and the host produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (response counters and latency histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The core only emits `trace!`/`debug!` events; the host decides levels
//! - Metrics are recorded by middleware, never by the wrapper itself

pub mod logging;
pub mod metrics;
