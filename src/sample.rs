use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Out-of-band latency value recorded for a probe that failed or timed out.
pub const FAILURE_SENTINEL: u32 = 999;

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Latency {
    Measured(u32),
    Failed,
}

impl Latency {
    /// Builds a measured latency, capped just below the sentinel so a very slow
    /// success is never mistaken for a failure.
    pub fn measured(ms: u32) -> Self {
        Latency::Measured(ms.min(FAILURE_SENTINEL - 1))
    }

    pub fn from_millis(ms: u32) -> Self {
        if ms == FAILURE_SENTINEL {
            Latency::Failed
        } else {
            Latency::measured(ms)
        }
    }

    pub fn as_millis(self) -> u32 {
        match self {
            Latency::Measured(ms) => ms,
            Latency::Failed => FAILURE_SENTINEL,
        }
    }

    pub fn is_failure(self) -> bool {
        matches!(self, Latency::Failed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    pub latency: Latency,
}

impl Sample {
    pub fn new(timestamp: DateTime<Local>, latency: Latency) -> Self {
        Self { timestamp, latency }
    }

    pub fn now(latency: Latency) -> Self {
        Self::new(Local::now(), latency)
    }

    /// Wall-clock label used on the chart axis.
    pub fn clock_label(&self) -> String {
        self.timestamp.format("%H:%M:%S").to_string()
    }

    pub fn to_event(&self) -> SampleEvent {
        SampleEvent(self.timestamp.timestamp_millis(), self.latency.as_millis())
    }
}

/// `(timestamp_millis, latency_ms)` pushed to subscribers once per settled probe.
/// Serializes as a two-element JSON array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEvent(pub i64, pub u32);

impl SampleEvent {
    pub fn timestamp_millis(&self) -> i64 {
        self.0
    }

    pub fn latency_ms(&self) -> u32 {
        self.1
    }
}

/// Append-only, chronologically ordered series of samples for one session.
#[derive(Debug, Clone, Default)]
pub struct SampleLog {
    samples: Vec<Sample>,
}

impl SampleLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample. A wall clock that stepped backwards is clamped to the
    /// previous timestamp so the log stays non-decreasing.
    pub fn push(&mut self, mut sample: Sample) -> &Sample {
        if let Some(last) = self.samples.last() {
            if sample.timestamp < last.timestamp {
                sample.timestamp = last.timestamp;
            }
        }
        self.samples.push(sample);
        &self.samples[self.samples.len() - 1]
    }

    /// Empties the log at the start of a new session.
    pub(crate) fn reset(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.samples
    }

    /// Read-only view of the most recent `size` samples.
    pub fn window(&self, size: usize) -> &[Sample] {
        let start = self.samples.len().saturating_sub(size);
        &self.samples[start..]
    }
}

impl FromIterator<Sample> for SampleLog {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        let mut log = SampleLog::new();
        for sample in iter {
            log.push(sample);
        }
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Local> {
        Local.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn measured_latency_stays_below_sentinel() {
        assert_eq!(Latency::measured(998), Latency::Measured(998));
        assert_eq!(Latency::measured(999), Latency::Measured(998));
        assert_eq!(Latency::measured(5_000).as_millis(), 998);
        assert!(Latency::from_millis(999).is_failure());
        assert_eq!(Latency::from_millis(42), Latency::Measured(42));
        assert_eq!(Latency::Failed.as_millis(), FAILURE_SENTINEL);
    }

    #[test]
    fn event_serializes_as_pair() {
        let sample = Sample::new(at(0), Latency::Failed);
        let event = sample.to_event();
        assert_eq!(event.latency_ms(), 999);
        assert_eq!(event.timestamp_millis(), 1_700_000_000_000);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, "[1700000000000,999]");
    }

    #[test]
    fn push_clamps_backwards_clock() {
        let mut log = SampleLog::new();
        log.push(Sample::new(at(10), Latency::Measured(20)));
        let pushed = log.push(Sample::new(at(10) - Duration::seconds(3), Latency::Measured(30)));
        assert_eq!(pushed.timestamp, at(10));
        assert!(log.as_slice().windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn window_returns_trailing_samples() {
        let log: SampleLog = (0..25)
            .map(|i| Sample::new(at(i), Latency::Measured(i as u32)))
            .collect();
        let window = log.window(20);
        assert_eq!(window.len(), 20);
        assert_eq!(window[0].latency, Latency::Measured(5));
        assert_eq!(log.len(), 25);
        assert_eq!(log.window(100).len(), 25);
        assert!(SampleLog::new().window(20).is_empty());
    }

    #[test]
    fn clock_label_is_hours_minutes_seconds() {
        let ts = Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap();
        assert_eq!(Sample::new(ts, Latency::Measured(1)).clock_label(), "09:05:07");
    }
}
