use egui::Color32;

use crate::sample::FAILURE_SENTINEL;

const GREEN_THRESHOLD: u32 = 50;
const YELLOW_THRESHOLD: u32 = 100;
const ORANGE_THRESHOLD: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyColor {
    Green,
    Yellow,
    Orange,
    Red,
    Failed,
}

impl LatencyColor {
    pub fn to_color32(self) -> Color32 {
        match self {
            LatencyColor::Green => Color32::from_rgb(0x22, 0xC5, 0x5E),
            LatencyColor::Yellow => Color32::from_rgb(0xEA, 0xB3, 0x08),
            LatencyColor::Orange => Color32::from_rgb(0xF9, 0x73, 0x16),
            LatencyColor::Red => Color32::from_rgb(0xEF, 0x44, 0x44),
            LatencyColor::Failed => Color32::from_rgb(0x18, 0x18, 0x1B),
        }
    }

    /// Bar color for a single sample.
    pub fn for_sample(latency_ms: u32) -> Self {
        match latency_ms {
            ms if ms < GREEN_THRESHOLD => LatencyColor::Green,
            ms if ms < YELLOW_THRESHOLD => LatencyColor::Yellow,
            ms if ms < ORANGE_THRESHOLD => LatencyColor::Orange,
            FAILURE_SENTINEL => LatencyColor::Failed,
            _ => LatencyColor::Red,
        }
    }

    /// Text color for a min/max/avg figure; a zero figure stays uncolored.
    pub fn for_stat(value: u32) -> Option<Self> {
        match value {
            0 => None,
            v if v < GREEN_THRESHOLD => Some(LatencyColor::Green),
            v if v < YELLOW_THRESHOLD => Some(LatencyColor::Yellow),
            v if v < ORANGE_THRESHOLD => Some(LatencyColor::Orange),
            _ => Some(LatencyColor::Red),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_thresholds() {
        assert_eq!(LatencyColor::for_sample(0), LatencyColor::Green);
        assert_eq!(LatencyColor::for_sample(49), LatencyColor::Green);
        assert_eq!(LatencyColor::for_sample(50), LatencyColor::Yellow);
        assert_eq!(LatencyColor::for_sample(150), LatencyColor::Orange);
        assert_eq!(LatencyColor::for_sample(200), LatencyColor::Red);
        assert_eq!(LatencyColor::for_sample(998), LatencyColor::Red);
        assert_eq!(LatencyColor::for_sample(999), LatencyColor::Failed);
    }

    #[test]
    fn stat_thresholds() {
        assert_eq!(LatencyColor::for_stat(0), None);
        assert_eq!(LatencyColor::for_stat(12), Some(LatencyColor::Green));
        assert_eq!(LatencyColor::for_stat(99), Some(LatencyColor::Yellow));
        assert_eq!(LatencyColor::for_stat(360), Some(LatencyColor::Red));
        assert_eq!(LatencyColor::for_stat(999), Some(LatencyColor::Red));
    }
}
