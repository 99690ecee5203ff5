//! Observability: operation counters consumed by the external
//! monitoring stack. Logging goes through `tracing`; observability is
//! read-only and never affects execution.

mod metrics;

pub use metrics::{KindSnapshot, MetricsRegistry, MetricsSnapshot};
