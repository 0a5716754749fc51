//! Fan-related domain types
//!
//! Provides validated types for fan speed and the commands sent to a device.

use crate::domain::DeviceHandle;
use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fan speed percentage (0-100)
///
/// Validated on construction to ensure the value is within valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct FanSpeed(u8);

impl FanSpeed {
    /// Minimum valid fan speed
    pub const MIN: u8 = 0;
    /// Maximum valid fan speed
    pub const MAX: u8 = 100;
    /// Fans at full speed
    pub const FULL: FanSpeed = FanSpeed(Self::MAX);

    /// Create a new FanSpeed with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidFanSpeed` if value > 100
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if value > Self::MAX {
            return Err(DomainError::InvalidFanSpeed(value));
        }
        Ok(Self(value))
    }

    /// Clamp an arbitrary signed percentage into `[lo, hi]`
    ///
    /// An inverted range resolves to `hi`.
    pub fn clamped(raw: i64, lo: FanSpeed, hi: FanSpeed) -> Self {
        // lo/hi are already in range, so the cast cannot truncate
        Self(raw.max(i64::from(lo.0)).min(i64::from(hi.0)) as u8)
    }

    /// Get the speed as a percentage value (0-100)
    #[inline]
    pub const fn as_percentage(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for FanSpeed {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FanSpeed> for u8 {
    fn from(speed: FanSpeed) -> Self {
        speed.0
    }
}

/// A fan speed destined for one device
///
/// This is the only value that crosses into the actuation boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanCommand {
    pub device: DeviceHandle,
    pub speed: FanSpeed,
}

impl FanCommand {
    pub fn new(device: DeviceHandle, speed: FanSpeed) -> Self {
        Self { device, speed }
    }
}

impl fmt::Display for FanCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.device, self.speed)
    }
}
