//! Latency statistics over run samples.

use serde::Serialize;

/// Summary of request latencies in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub count: usize,
    pub mean_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
}

impl LatencyStats {
    /// Compute statistics over the usable samples.
    ///
    /// Samples that are not finite or are negative are skipped and not counted.
    /// Returns `None` when no usable sample remains.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = samples.iter().copied().filter(|v| usable(*v)).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|left, right| left.total_cmp(right));

        let count = sorted.len();
        let sum: f64 = sorted.iter().sum();

        Some(Self {
            count,
            mean_ms: sum / count as f64,
            min_ms: sorted[0],
            max_ms: sorted[count - 1],
            median_ms: median(&sorted),
            p95_ms: percentile(&sorted, 0.95),
        })
    }
}

/// A latency is usable when it is a finite, non-negative number.
pub fn usable(latency_ms: f64) -> bool {
    latency_ms.is_finite() && latency_ms >= 0.0
}

fn median(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Nearest-rank percentile of an ascending, non-empty slice.
fn percentile(sorted: &[f64], quantile: f64) -> f64 {
    let q = quantile.clamp(0.0, 1.0);
    let rank = ((sorted.len() as f64) * q).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index]
}
