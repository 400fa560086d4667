//! Timing policy for the signal cycle

use std::time::Duration;

use super::error::ConfigError;

/// Green seconds granted per counted vehicle
pub const GREEN_SECONDS_PER_VEHICLE: u32 = 3;

/// No direction gets less green than this, even with no traffic
pub const MIN_GREEN_SECONDS: u32 = 10;

/// No direction gets more green than this, however busy
pub const MAX_GREEN_SECONDS: u32 = 30;

/// Fixed yellow interval
pub const YELLOW_SECONDS: u32 = 3;

/// Length of one countdown step in real time
pub const TICK: Duration = Duration::from_secs(1);

/// Durations used by the scheduler.
///
/// All green/yellow lengths are counted in ticks. At the default tick a
/// tick is one second; tests and the headless runner shrink the tick to
/// run whole cycles quickly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingConfig {
    pub tick: Duration,
    pub green_per_vehicle: u32,
    pub min_green: u32,
    pub max_green: u32,
    pub yellow: u32,
    /// Time the live feed gets to fill the store after the per-cycle reset
    pub sample_window: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick: TICK,
            green_per_vehicle: GREEN_SECONDS_PER_VEHICLE,
            min_green: MIN_GREEN_SECONDS,
            max_green: MAX_GREEN_SECONDS,
            yellow: YELLOW_SECONDS,
            sample_window: Duration::ZERO,
        }
    }
}

impl TimingConfig {
    /// Default policy with a different tick length
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_green == 0 {
            return Err(ConfigError::ZeroMaxGreen);
        }
        if self.min_green > self.max_green {
            return Err(ConfigError::GreenBoundsInverted {
                min: self.min_green,
                max: self.max_green,
            });
        }
        if self.yellow == 0 {
            return Err(ConfigError::ZeroYellow);
        }
        Ok(())
    }

    /// Green interval for a direction with `count` vehicles waiting
    pub fn green_seconds(&self, count: u32) -> u32 {
        count
            .saturating_mul(self.green_per_vehicle)
            .max(self.min_green)
            .min(self.max_green)
    }
}

/// Green interval under the default policy: `clamp(3 * count, 10, 30)`
pub fn green_seconds(count: u32) -> u32 {
    TimingConfig::default().green_seconds(count)
}
