use std::time::Instant;

use crate::MetricsSink;

/// RAII timer that reports elapsed time to a [`MetricsSink`] on drop,
/// mirroring the drop-logs-the-timing shape used throughout this corpus.
pub struct OperationTimer<'a> {
    start: Instant,
    operation: &'static str,
    sink: &'a dyn MetricsSink,
}

impl<'a> OperationTimer<'a> {
    pub fn new(operation: &'static str, sink: &'a dyn MetricsSink) -> Self {
        Self {
            start: Instant::now(),
            operation,
            sink,
        }
    }
}

impl Drop for OperationTimer<'_> {
    fn drop(&mut self) {
        self.sink
            .record_operation_timing(self.operation, self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullMetricsSink;

    #[test]
    fn timer_reports_on_drop_without_panicking() {
        let sink = NullMetricsSink;
        {
            let _timer = OperationTimer::new("table.insert", &sink);
        }
    }
}
