//! Metrics collection for observability
//!
//! Two layers: a process-wide Prometheus registry for counters and
//! histograms, and `TurnMetrics`, the bounded latency window that computes
//! exact rank-interpolated percentiles over the most recent samples.

pub mod tracker;

pub use tracker::{MetricsSnapshot, TurnMetrics};

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec_with_registry, register_counter_with_registry,
    register_histogram_with_registry, Counter, CounterVec, Histogram, Opts, Registry,
};
use std::sync::Arc;

/// Global metrics registry
pub static ENGINE_METRICS: Lazy<Arc<EngineMetrics>> =
    Lazy::new(|| Arc::new(EngineMetrics::new().expect("Failed to initialize metrics")));

pub struct EngineMetrics {
    registry: Registry,

    /// Turns by outcome
    pub turns_total: CounterVec,

    /// Provider calls by model and status
    pub provider_calls: CounterVec,

    /// End-to-end turn duration in seconds
    pub turn_duration: Histogram,

    /// Messages evicted to stay under the context token ceiling
    pub context_truncations: Counter,

    /// Corrupted context logs reset to empty
    pub context_recoveries: Counter,

    /// Feedback entries recorded
    pub feedback_recorded: Counter,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let turns_total = register_counter_vec_with_registry!(
            Opts::new("orquesta_turns_total", "Total orchestrated turns by outcome"),
            &["status"],
            registry
        )?;

        let provider_calls = register_counter_vec_with_registry!(
            Opts::new(
                "orquesta_provider_calls_total",
                "Total provider calls by model and status"
            ),
            &["model", "status"],
            registry
        )?;

        let turn_duration = register_histogram_with_registry!(
            "orquesta_turn_duration_seconds",
            "End-to-end turn duration in seconds",
            registry
        )?;

        let context_truncations = register_counter_with_registry!(
            Opts::new(
                "orquesta_context_truncations_total",
                "Messages evicted by token budget enforcement"
            ),
            registry
        )?;

        let context_recoveries = register_counter_with_registry!(
            Opts::new(
                "orquesta_context_recoveries_total",
                "Corrupted context logs recovered to empty"
            ),
            registry
        )?;

        let feedback_recorded = register_counter_with_registry!(
            Opts::new(
                "orquesta_feedback_recorded_total",
                "Human feedback entries recorded"
            ),
            registry
        )?;

        Ok(Self {
            registry,
            turns_total,
            provider_calls,
            turn_duration,
            context_truncations,
            context_recoveries,
            feedback_recorded,
        })
    }

    /// Record a provider call outcome
    pub fn record_provider_call(&self, model: &str, success: bool) {
        let status = if success { "success" } else { "error" };
        self.provider_calls.with_label_values(&[model, status]).inc();
    }

    /// Record a turn outcome
    pub fn record_turn(&self, success: bool, duration_secs: f64) {
        let status = if success { "success" } else { "error" };
        self.turns_total.with_label_values(&[status]).inc();
        self.turn_duration.observe(duration_secs);
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        use prometheus::Encoder;

        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();

        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .unwrap_or_default();

        String::from_utf8(buffer).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_initialization() {
        let metrics = EngineMetrics::new();
        assert!(metrics.is_ok());
    }

    #[test]
    fn test_record_turn_and_export() {
        let metrics = EngineMetrics::new().unwrap();
        metrics.record_turn(true, 0.42);
        metrics.record_turn(false, 1.8);
        metrics.record_provider_call("claude-3-5-sonnet", true);

        let exported = metrics.export_prometheus();
        assert!(exported.contains("orquesta_turns_total"));
        assert!(exported.contains("orquesta_provider_calls_total"));
    }
}
