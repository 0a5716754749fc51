//! Dry-run gateway decorator
//!
//! Reads go to the wrapped gateway; fan writes are logged instead of applied.

use crate::domain::{DeviceHandle, FanCommand, Temperature};
use crate::error::GatewayError;
use crate::gateway::DeviceGateway;

/// Wraps a gateway so that nothing is ever written to the hardware
#[derive(Debug, Clone)]
pub struct DryRunGateway<G> {
    inner: G,
}

impl<G: DeviceGateway> DryRunGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }

    /// Get the wrapped gateway
    pub fn inner(&self) -> &G {
        &self.inner
    }
}

impl<G: DeviceGateway> DeviceGateway for DryRunGateway<G> {
    fn list_devices(&self) -> Result<Vec<DeviceHandle>, GatewayError> {
        self.inner.list_devices()
    }

    fn read_temperature(&self, device: DeviceHandle) -> Result<Temperature, GatewayError> {
        self.inner.read_temperature(device)
    }

    fn set_fan_speed(&self, command: FanCommand) -> Result<(), GatewayError> {
        log::info!(
            "[DRY RUN] Would set {} fan to {}",
            command.device,
            command.speed
        );
        Ok(())
    }

    fn set_auto_fan_control(&self, device: DeviceHandle) -> Result<(), GatewayError> {
        log::info!("[DRY RUN] Would restore automatic fan control on {}", device);
        Ok(())
    }
}
