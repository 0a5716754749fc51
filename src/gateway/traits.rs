//! Trait definitions for device access
//!
//! The control loop only ever talks to hardware through [`DeviceGateway`],
//! so the loop, controller and shutdown logic can run against an in-memory
//! implementation in tests.

use crate::domain::{DeviceHandle, FanCommand, Temperature};
use crate::error::GatewayError;

use std::sync::Arc;

/// Reads die temperature and drives fan speed for GPUs addressed by index
///
/// Implementations hold no per-device state; every call goes to the device.
pub trait DeviceGateway: Send + Sync {
    /// Enumerate controllable devices
    ///
    /// Fails with `GatewayError::Discovery` when enumeration is unavailable
    /// or reports no devices.
    fn list_devices(&self) -> Result<Vec<DeviceHandle>, GatewayError>;

    /// Read the current die temperature
    ///
    /// Fails with `GatewayError::SensorRead`.
    fn read_temperature(&self, device: DeviceHandle) -> Result<Temperature, GatewayError>;

    /// Force the fan to the commanded speed, enabling manual control if needed
    ///
    /// Fails with `GatewayError::Actuation`.
    fn set_fan_speed(&self, command: FanCommand) -> Result<(), GatewayError>;

    /// Hand fan control back to the driver
    ///
    /// Only used while shutting down. Callers log failures and move on.
    fn set_auto_fan_control(&self, device: DeviceHandle) -> Result<(), GatewayError>;
}

impl<G: DeviceGateway + ?Sized> DeviceGateway for Arc<G> {
    fn list_devices(&self) -> Result<Vec<DeviceHandle>, GatewayError> {
        (**self).list_devices()
    }

    fn read_temperature(&self, device: DeviceHandle) -> Result<Temperature, GatewayError> {
        (**self).read_temperature(device)
    }

    fn set_fan_speed(&self, command: FanCommand) -> Result<(), GatewayError> {
        (**self).set_fan_speed(command)
    }

    fn set_auto_fan_control(&self, device: DeviceHandle) -> Result<(), GatewayError> {
        (**self).set_auto_fan_control(device)
    }
}

impl<G: DeviceGateway + ?Sized> DeviceGateway for Box<G> {
    fn list_devices(&self) -> Result<Vec<DeviceHandle>, GatewayError> {
        (**self).list_devices()
    }

    fn read_temperature(&self, device: DeviceHandle) -> Result<Temperature, GatewayError> {
        (**self).read_temperature(device)
    }

    fn set_fan_speed(&self, command: FanCommand) -> Result<(), GatewayError> {
        (**self).set_fan_speed(command)
    }

    fn set_auto_fan_control(&self, device: DeviceHandle) -> Result<(), GatewayError> {
        (**self).set_auto_fan_control(device)
    }
}
