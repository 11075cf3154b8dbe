//! Prometheus metrics and structured logging for mmsim.
//!
//! Observability for the simulation loops:
//! - Prometheus metrics for ticks, trades, coordination and risk gates
//! - Structured JSON logging with tracing

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
