//! Metrics collection port.
//!
//! The driver reports one timer per request and leaves counters to the
//! embedding application. Implementations must be internally thread-safe;
//! the sink is shared by reference across a connection tree.

use std::time::Duration;

/// Timer name recorded once per request, on success and failure alike.
pub const REQUEST_TIMER: &str = "fauna-request";

/// Minimal timer + counter sink.
pub trait MetricsSink: Send + Sync {
    /// Record an elapsed wall-time observation.
    fn record_timer(&self, name: &str, elapsed: Duration);

    /// Add to a monotonically increasing counter.
    fn record_counter(&self, name: &str, value: u64);
}

/// Default sink that drops every observation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn record_timer(&self, _name: &str, _elapsed: Duration) {}

    fn record_counter(&self, _name: &str, _value: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingSink {
        timers: Arc<Mutex<Vec<(String, Duration)>>>,
        counters: Arc<Mutex<Vec<(String, u64)>>>,
    }

    impl MetricsSink for RecordingSink {
        fn record_timer(&self, name: &str, elapsed: Duration) {
            self.timers.lock().unwrap().push((name.to_string(), elapsed));
        }

        fn record_counter(&self, name: &str, value: u64) {
            self.counters.lock().unwrap().push((name.to_string(), value));
        }
    }

    #[test]
    fn recording_sink_observes_both_instruments() {
        let sink = RecordingSink::default();
        sink.record_timer(REQUEST_TIMER, Duration::from_millis(12));
        sink.record_counter("fauna-errors", 1);

        assert_eq!(sink.timers.lock().unwrap().len(), 1);
        assert_eq!(sink.counters.lock().unwrap()[0], ("fauna-errors".to_string(), 1));
    }

    #[test]
    fn noop_sink_is_object_safe() {
        let sink: Box<dyn MetricsSink> = Box::new(NoopMetricsSink);
        sink.record_timer(REQUEST_TIMER, Duration::from_secs(1));
        sink.record_counter("anything", 42);
    }
}
