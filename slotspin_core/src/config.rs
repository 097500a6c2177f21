use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::symbols::REEL_COUNT;

/// Reel animation timing, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SpinTiming {
    /// Delay before each reel starts spinning
    pub staggers_ms: [u64; REEL_COUNT],
    /// Interval between cosmetic symbol changes
    pub tick_ms: u64,
    /// How long a reel spins, counted from its stagger point
    pub duration_ms: u64,
}

impl Default for SpinTiming {
    fn default() -> Self {
        Self {
            staggers_ms: [0, 200, 400],
            tick_ms: 90,
            duration_ms: 800,
        }
    }
}

impl SpinTiming {
    pub fn stagger(&self, reel: usize) -> Duration {
        Duration::from_millis(self.staggers_ms[reel])
    }

    // tokio intervals reject a zero period
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Time from acceptance until reel `reel` settles.
    pub fn settle_after(&self, reel: usize) -> Duration {
        self.duration() + self.stagger(reel)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MachineConfig {
    pub starting_balance: u64,
    pub timing: SpinTiming,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            starting_balance: 500,
            timing: SpinTiming::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reels_settle_two_hundred_ms_apart() {
        let timing = SpinTiming::default();
        assert_eq!(timing.settle_after(0), Duration::from_millis(800));
        assert_eq!(timing.settle_after(1), Duration::from_millis(1000));
        assert_eq!(timing.settle_after(2), Duration::from_millis(1200));
    }

    #[test]
    fn partial_config_fills_defaults() {
        let cfg: MachineConfig = serde_json::from_str(r#"{"starting_balance": 42}"#).unwrap();
        assert_eq!(cfg.starting_balance, 42);
        assert_eq!(cfg.timing, SpinTiming::default());
    }
}
