use serde::Serialize;

use crate::sample::Sample;

/// Trailing window used for the "recent" view.
pub const DEFAULT_WINDOW: usize = 20;

/// Summary statistics derived from a slice of the sample log.
///
/// `sent_count` counts successful probes only; `total()` gives every probe.
/// Min, max and mean include the failure sentinel, so a single failure can
/// dominate a short window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StatsSnapshot {
    pub sent_count: u64,
    pub failed_count: u64,
    pub min: u32,
    pub max: u32,
    pub mean: f64,
}

impl StatsSnapshot {
    pub fn total(&self) -> u64 {
        self.sent_count + self.failed_count
    }

    pub fn mean_rounded(&self) -> u32 {
        self.mean.round() as u32
    }
}

pub fn compute_stats(samples: &[Sample]) -> StatsSnapshot {
    if samples.is_empty() {
        return StatsSnapshot::default();
    }

    let failed_count = samples.iter().filter(|s| s.latency.is_failure()).count() as u64;
    let sent_count = samples.len() as u64 - failed_count;

    let values = samples.iter().map(|s| s.latency.as_millis());
    let min = values.clone().min().unwrap_or(0);
    let max = values.clone().max().unwrap_or(0);
    let total: u64 = values.map(u64::from).sum();

    StatsSnapshot {
        sent_count,
        failed_count,
        min,
        max,
        mean: total as f64 / samples.len() as f64,
    }
}

/// Statistics over the most recent `size` samples.
pub fn compute_window_stats(samples: &[Sample], size: usize) -> StatsSnapshot {
    let start = samples.len().saturating_sub(size);
    compute_stats(&samples[start..])
}
