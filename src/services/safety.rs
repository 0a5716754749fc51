//! Fan speed bounds and the over-temperature override

use crate::domain::{ControlParameters, FanSpeed};

/// Turns a raw controller command into a speed the fans may be given
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafetyClamp {
    min: FanSpeed,
    max: FanSpeed,
    ceiling: f64,
}

impl SafetyClamp {
    pub fn new(params: &ControlParameters) -> Self {
        Self {
            min: params.min_fan,
            max: params.max_fan,
            ceiling: params.ceiling(),
        }
    }

    /// Temperature at or above which fans are forced to full speed
    pub fn ceiling(&self) -> f64 {
        self.ceiling
    }

    /// Whether `temperature` triggers the full-speed override
    pub fn is_over_ceiling(&self, temperature: f64) -> bool {
        temperature >= self.ceiling
    }

    /// Bound `raw` to the configured fan range, or force 100% over the ceiling
    ///
    /// The override wins over whatever the controller asked for.
    pub fn clamp(&self, raw: i64, temperature: f64) -> FanSpeed {
        if self.is_over_ceiling(temperature) {
            return FanSpeed::FULL;
        }
        FanSpeed::clamped(raw, self.min, self.max)
    }
}
