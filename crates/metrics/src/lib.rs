//! The narrow counter/timing surface the engine reports through.
//!
//! The engine never talks to Prometheus, StatsD, or any other transport
//! directly — it drives a [`MetricsSink`] trait object, and the embedding
//! process decides what, if anything, happens with those numbers.
//! [`NullMetricsSink`] is the default for embedding contexts that don't
//! want metrics at all.

mod timer;

use std::time::Duration;

pub use timer::OperationTimer;

/// Counters and timings the storage/query engine reports as it runs.
///
/// All methods take `&self`; implementations that need mutable state use
/// interior mutability (the engine may call these from several worker
/// threads concurrently).
pub trait MetricsSink: Send + Sync {
    /// Reported once per second by the engine's background metrics tick:
    /// the number of objects added across all loaded tables since the
    /// previous tick, then reset to zero.
    fn objects_inserted_per_second(&self, rate: u64);

    /// Reported whenever the total object count across all loaded tables
    /// changes (not on every tick, only on change).
    fn total_objects(&self, total: u64);

    /// Reported when a named operation (e.g. `"table.insert"`,
    /// `"query.evaluate"`) finishes. `operation` is a short, stable,
    /// dot-separated tag; callers typically use [`OperationTimer`] rather
    /// than measuring `Duration` by hand.
    fn record_operation_timing(&self, operation: &str, elapsed: Duration);
}

/// No-op sink. Every call is discarded; used by default when an embedder
/// does not care about metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetricsSink;

impl MetricsSink for NullMetricsSink {
    fn objects_inserted_per_second(&self, _rate: u64) {}

    fn total_objects(&self, _total: u64) {}

    fn record_operation_timing(&self, _operation: &str, _elapsed: Duration) {}
}

/// Sink that forwards every report through `tracing` at debug level.
/// Convenient when an embedder wants the numbers in their existing log
/// pipeline without wiring up a dedicated metrics backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetricsSink;

impl MetricsSink for TracingMetricsSink {
    fn objects_inserted_per_second(&self, rate: u64) {
        tracing::debug!(rate, "objects inserted per second");
    }

    fn total_objects(&self, total: u64) {
        tracing::debug!(total, "total objects");
    }

    fn record_operation_timing(&self, operation: &str, elapsed: Duration) {
        tracing::debug!(operation, ?elapsed, "operation timing");
    }
}
