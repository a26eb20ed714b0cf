//! Prometheus metrics for the prepare pipeline
//!
//! - `transfer_prepare_ms` (histogram): latency of successfully published
//!   prepare commands, in milliseconds
//! - `transfer_prepare_requests_total` (counter): prepare commands by
//!   outcome (`accepted`, `rejected`, `failed`)
//!
//! The histogram only sees the success path. A [`PrepareTimer`] records on
//! [`PrepareTimer::stop`]; one that is dropped unstopped records nothing, so
//! rejected and failed commands never show up in the latency distribution.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Instant;

use super::{Result, TelemetryError};

/// Histogram buckets in milliseconds
pub const PREPARE_MS_BUCKETS: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0,
];

/// Terminal state of one prepare command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Published to the broker
    Accepted,
    /// Failed schema validation
    Rejected,
    /// Broker did not accept the event
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Accepted => "accepted",
            Outcome::Rejected => "rejected",
            Outcome::Failed => "failed",
        }
    }
}

pub struct AdapterMetrics {
    registry: Arc<Registry>,
    prepare_ms: Histogram,
    requests_total: IntCounterVec,
}

impl AdapterMetrics {
    /// Create the metrics on a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Create the metrics and register them with `registry`
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let prepare_ms = Histogram::with_opts(
            HistogramOpts::new(
                "transfer_prepare_ms",
                "Latency of published transfer prepare commands in milliseconds",
            )
            .buckets(PREPARE_MS_BUCKETS.to_vec()),
        )?;

        let requests_total = IntCounterVec::new(
            Opts::new(
                "transfer_prepare_requests_total",
                "Transfer prepare commands by outcome",
            ),
            &["outcome"],
        )?;

        registry.register(Box::new(prepare_ms.clone()))?;
        registry.register(Box::new(requests_total.clone()))?;

        Ok(Self {
            registry,
            prepare_ms,
            requests_total,
        })
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn start_timer(&self) -> PrepareTimer {
        PrepareTimer {
            start: Instant::now(),
            histogram: self.prepare_ms.clone(),
        }
    }

    pub fn record_outcome(&self, outcome: Outcome) {
        self.requests_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    /// Number of latency samples recorded so far
    pub fn prepare_sample_count(&self) -> u64 {
        self.prepare_ms.get_sample_count()
    }

    pub fn outcome_count(&self, outcome: Outcome) -> u64 {
        self.requests_total
            .with_label_values(&[outcome.as_str()])
            .get()
    }

    /// Encode every registered metric in the text exposition format
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(TelemetryError::Metrics)?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Encoding(e.to_string()))
    }
}

/// Latency measurement for one prepare command
#[must_use = "a timer records nothing unless stopped"]
pub struct PrepareTimer {
    start: Instant,
    histogram: Histogram,
}

impl PrepareTimer {
    /// Observe the elapsed time and return it in milliseconds
    pub fn stop(self) -> f64 {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        self.histogram.observe(elapsed_ms);
        elapsed_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_timer_records_one_sample() {
        let metrics = AdapterMetrics::new().unwrap();
        let elapsed = metrics.start_timer().stop();

        assert!(elapsed >= 0.0);
        assert_eq!(metrics.prepare_sample_count(), 1);
    }

    #[test]
    fn test_dropped_timer_records_nothing() {
        let metrics = AdapterMetrics::new().unwrap();
        {
            let _timer = metrics.start_timer();
        }
        assert_eq!(metrics.prepare_sample_count(), 0);
    }

    #[test]
    fn test_outcome_counters() {
        let metrics = AdapterMetrics::new().unwrap();
        metrics.record_outcome(Outcome::Accepted);
        metrics.record_outcome(Outcome::Accepted);
        metrics.record_outcome(Outcome::Rejected);

        assert_eq!(metrics.outcome_count(Outcome::Accepted), 2);
        assert_eq!(metrics.outcome_count(Outcome::Rejected), 1);
        assert_eq!(metrics.outcome_count(Outcome::Failed), 0);
    }

    #[test]
    fn test_render_exposition() {
        let metrics = AdapterMetrics::new().unwrap();
        metrics.start_timer().stop();
        metrics.record_outcome(Outcome::Failed);

        let text = metrics.render().unwrap();
        assert!(text.contains("transfer_prepare_ms_bucket"));
        assert!(text.contains("transfer_prepare_ms_count 1"));
        assert!(text.contains("transfer_prepare_requests_total{outcome=\"failed\"} 1"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        AdapterMetrics::with_registry(Arc::clone(&registry)).unwrap();
        assert!(AdapterMetrics::with_registry(registry).is_err());
    }
}
