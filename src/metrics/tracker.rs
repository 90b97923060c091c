//! Bounded-window latency tracking with interpolated percentiles

use crate::config::MetricsConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::RwLock;

/// Aggregate view over the retained sample window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Total outcomes recorded since creation (not bounded by the window)
    pub count: u64,
    pub success_rate: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

struct Window {
    samples: VecDeque<f64>,
    total: u64,
    successes: u64,
}

/// Records per-turn latency and outcome. Percentiles are computed over the
/// most recent `window_size` latency samples; older samples are evicted so
/// the window never grows unbounded. A snapshot taken concurrently with a
/// record never observes a partially appended sample.
pub struct TurnMetrics {
    window_size: usize,
    inner: RwLock<Window>,
}

impl TurnMetrics {
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            window_size: config.window_size.max(1),
            inner: RwLock::new(Window {
                samples: VecDeque::with_capacity(config.window_size.max(1)),
                total: 0,
                successes: 0,
            }),
        }
    }

    pub fn record(&self, latency_ms: f64, success: bool) {
        let mut window = self.inner.write().expect("metrics lock poisoned");
        if window.samples.len() == self.window_size {
            window.samples.pop_front();
        }
        window.samples.push_back(latency_ms);
        window.total += 1;
        if success {
            window.successes += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let window = self.inner.read().expect("metrics lock poisoned");

        let mut sorted: Vec<f64> = window.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let success_rate = if window.total == 0 {
            0.0
        } else {
            window.successes as f64 / window.total as f64
        };

        MetricsSnapshot {
            count: window.total,
            success_rate,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

/// Linear interpolation between the two nearest ranks of a sorted window
fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = q * (n - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let weight = rank - lower as f64;
                sorted[lower] * (1.0 - weight) + sorted[upper] * weight
            }
        }
    }
}
