//! Domain models for nvfan
//!
//! This module contains all domain types with validation.
//! Types are validated on construction (fail-fast pattern).

pub mod device;
pub mod fan;
pub mod params;
pub mod thermal;

pub use device::DeviceHandle;
pub use fan::{FanCommand, FanSpeed};
pub use params::ControlParameters;
pub use thermal::{Sample, Temperature};
