//! Thermal domain types
//!
//! Provides the temperature type and the per-tick sample.

use crate::domain::DeviceHandle;
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Die temperature in degrees Celsius
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Temperature(f64);

impl Temperature {
    /// Create a new Temperature
    ///
    /// # Errors
    /// Returns `DomainError::InvalidTemperature` for NaN or infinite values
    pub fn new(celsius: f64) -> Result<Self, DomainError> {
        if !celsius.is_finite() {
            return Err(DomainError::InvalidTemperature(celsius.to_string()));
        }
        Ok(Self(celsius))
    }

    /// Get the temperature in Celsius
    #[inline]
    pub const fn as_celsius(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°C", self.0)
    }
}

impl TryFrom<f64> for Temperature {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Temperature> for f64 {
    fn from(temp: Temperature) -> Self {
        temp.0
    }
}

/// One temperature reading, consumed within the tick that produced it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub device: DeviceHandle,
    pub temperature: Temperature,
    pub taken_at: Instant,
}

impl Sample {
    pub fn new(device: DeviceHandle, temperature: Temperature, taken_at: Instant) -> Self {
        Self {
            device,
            temperature,
            taken_at,
        }
    }
}
