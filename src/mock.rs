//! Mock implementations for testing
//!
//! Provides an in-memory gateway for exercising the controller, the loop and
//! the shutdown path without real hardware.

use crate::domain::{DeviceHandle, FanCommand, FanSpeed, Temperature};
use crate::error::GatewayError;
use crate::gateway::DeviceGateway;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, RwLock};

type ReadHook = Box<dyn Fn(DeviceHandle) + Send + Sync>;

/// In-memory gateway with scriptable faults
#[derive(Default)]
pub struct MockGateway {
    temperatures: RwLock<BTreeMap<u32, f64>>,
    failing_reads: RwLock<HashSet<u32>>,
    failing_writes: RwLock<HashSet<u32>>,
    fan_commands: Mutex<Vec<FanCommand>>,
    fan_speeds: Mutex<HashMap<u32, FanSpeed>>,
    auto_restores: Mutex<HashMap<u32, usize>>,
    reads: Mutex<HashMap<u32, usize>>,
    read_hook: Option<ReadHook>,
}

impl MockGateway {
    /// Create a gateway with no devices; discovery will fail
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a gateway exposing the given `(index, celsius)` devices
    pub fn with_temperatures(devices: &[(u32, f64)]) -> Self {
        let gateway = Self::default();
        for &(index, celsius) in devices {
            gateway.set_temperature(index, celsius);
        }
        gateway
    }

    /// Builder: run `hook` at the start of every temperature read
    pub fn with_read_hook(mut self, hook: impl Fn(DeviceHandle) + Send + Sync + 'static) -> Self {
        self.read_hook = Some(Box::new(hook));
        self
    }

    /// Set the reported temperature, adding the device if needed
    pub fn set_temperature(&self, index: u32, celsius: f64) {
        self.temperatures.write().unwrap().insert(index, celsius);
    }

    /// Make temperature reads for `index` fail (or succeed again)
    pub fn fail_reads(&self, index: u32, fail: bool) {
        let mut set = self.failing_reads.write().unwrap();
        if fail {
            set.insert(index);
        } else {
            set.remove(&index);
        }
    }

    /// Make fan writes for `index` fail (or succeed again)
    pub fn fail_writes(&self, index: u32, fail: bool) {
        let mut set = self.failing_writes.write().unwrap();
        if fail {
            set.insert(index);
        } else {
            set.remove(&index);
        }
    }

    /// Every fan command that reached the device, in order
    pub fn fan_commands(&self) -> Vec<FanCommand> {
        self.fan_commands.lock().unwrap().clone()
    }

    /// Last speed applied to a device
    pub fn fan_speed(&self, device: DeviceHandle) -> Option<FanSpeed> {
        self.fan_speeds
            .lock()
            .unwrap()
            .get(&device.index())
            .copied()
    }

    /// Number of times automatic control was restored on a device
    pub fn auto_restores(&self, device: DeviceHandle) -> usize {
        self.auto_restores
            .lock()
            .unwrap()
            .get(&device.index())
            .copied()
            .unwrap_or(0)
    }

    /// Number of temperature reads attempted on a device
    pub fn reads(&self, device: DeviceHandle) -> usize {
        self.reads
            .lock()
            .unwrap()
            .get(&device.index())
            .copied()
            .unwrap_or(0)
    }
}

impl DeviceGateway for MockGateway {
    fn list_devices(&self) -> Result<Vec<DeviceHandle>, GatewayError> {
        let devices: Vec<_> = self
            .temperatures
            .read()
            .unwrap()
            .keys()
            .copied()
            .map(DeviceHandle::new)
            .collect();
        if devices.is_empty() {
            return Err(GatewayError::Discovery("mock has no GPUs".to_string()));
        }
        Ok(devices)
    }

    fn read_temperature(&self, device: DeviceHandle) -> Result<Temperature, GatewayError> {
        if let Some(hook) = &self.read_hook {
            hook(device);
        }
        *self
            .reads
            .lock()
            .unwrap()
            .entry(device.index())
            .or_default() += 1;

        let index = device.index();
        if self.failing_reads.read().unwrap().contains(&index) {
            return Err(GatewayError::SensorRead {
                index,
                reason: "mock sensor failure".to_string(),
            });
        }
        let celsius = self
            .temperatures
            .read()
            .unwrap()
            .get(&index)
            .copied()
            .ok_or_else(|| GatewayError::SensorRead {
                index,
                reason: "no such device".to_string(),
            })?;
        Temperature::new(celsius).map_err(|e| GatewayError::SensorRead {
            index,
            reason: e.to_string(),
        })
    }

    fn set_fan_speed(&self, command: FanCommand) -> Result<(), GatewayError> {
        let index = command.device.index();
        if self.failing_writes.read().unwrap().contains(&index) {
            return Err(GatewayError::Actuation {
                index,
                reason: "mock actuation failure".to_string(),
            });
        }
        self.fan_commands.lock().unwrap().push(command);
        self.fan_speeds.lock().unwrap().insert(index, command.speed);
        Ok(())
    }

    fn set_auto_fan_control(&self, device: DeviceHandle) -> Result<(), GatewayError> {
        *self
            .auto_restores
            .lock()
            .unwrap()
            .entry(device.index())
            .or_default() += 1;
        if self.failing_writes.read().unwrap().contains(&device.index()) {
            return Err(GatewayError::Actuation {
                index: device.index(),
                reason: "mock actuation failure".to_string(),
            });
        }
        Ok(())
    }
}
