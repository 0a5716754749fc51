//! Controller parameters
//!
//! The immutable tuning set shared by every device's controller.

use crate::domain::FanSpeed;
use crate::error::ConfigError;
use std::time::Duration;

/// Tuning and safety parameters for the control loop
///
/// Loaded once before the loop starts. Use [`ControlParameters::validate`]
/// before handing a hand-built value to the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlParameters {
    /// Temperature the controller keeps the die below (°C)
    pub target_temperature: f64,
    /// Proportional gain (percent per °C)
    pub kp: f64,
    /// Integral gain (percent per °C·s)
    pub ki: f64,
    /// Derivative gain (percent per °C/s)
    pub kd: f64,
    /// Time between ticks
    pub sample_interval: Duration,
    /// Lowest fan speed the loop will command
    pub min_fan: FanSpeed,
    /// Highest fan speed the loop will command outside an override
    pub max_fan: FanSpeed,
    /// Bound on the magnitude of the integral accumulator
    pub max_integral: f64,
    /// Distance above target at which fans are forced to 100%
    pub ceiling_margin: f64,
}

impl ControlParameters {
    /// Default margin between target and the hard ceiling (°C)
    pub const DEFAULT_CEILING_MARGIN: f64 = 15.0;

    /// Temperature at or above which the safety override fires
    pub fn ceiling(&self) -> f64 {
        self.target_temperature + self.ceiling_margin
    }

    /// Reject values the loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_temperature.is_finite() {
            return Err(ConfigError::invalid(
                "control.target_temperature",
                "must be a finite number",
            ));
        }
        for (key, gain) in [
            ("control.kp", self.kp),
            ("control.ki", self.ki),
            ("control.kd", self.kd),
        ] {
            if !gain.is_finite() {
                return Err(ConfigError::invalid(key, "must be a finite number"));
            }
        }
        if self.sample_interval.is_zero() {
            return Err(ConfigError::invalid(
                "general.interval_seconds",
                "must be greater than zero",
            ));
        }
        if self.min_fan > self.max_fan {
            return Err(ConfigError::invalid(
                "fan.min_speed",
                format!(
                    "{} exceeds fan.max_speed {}",
                    self.min_fan, self.max_fan
                ),
            ));
        }
        if !self.max_integral.is_finite() || self.max_integral < 0.0 {
            return Err(ConfigError::invalid(
                "control.max_integral",
                "must be a non-negative finite number",
            ));
        }
        if !self.ceiling_margin.is_finite() || self.ceiling_margin <= 0.0 {
            return Err(ConfigError::invalid(
                "safety.ceiling_margin",
                "must be a positive finite number",
            ));
        }
        Ok(())
    }
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            target_temperature: 60.0,
            kp: 2.0,
            ki: 0.5,
            kd: 0.1,
            sample_interval: Duration::from_secs(2),
            min_fan: FanSpeed::new(30).unwrap_or(FanSpeed::FULL),
            max_fan: FanSpeed::FULL,
            max_integral: 50.0,
            ceiling_margin: Self::DEFAULT_CEILING_MARGIN,
        }
    }
}
