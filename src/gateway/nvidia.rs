//! Gateway backed by the NVIDIA driver tools
//!
//! Temperatures and enumeration come from `nvidia-smi`; fan control goes
//! through `nvidia-settings`, which needs an X display with Coolbits set.
//! Fan `N` is driven for GPU `N`.

use crate::config::CommandsConfig;
use crate::domain::{DeviceHandle, FanCommand, Temperature};
use crate::error::GatewayError;
use crate::gateway::command::CommandRunner;
use crate::gateway::DeviceGateway;

use std::time::Duration;

/// Device gateway that shells out to `nvidia-smi` and `nvidia-settings`
#[derive(Debug, Clone)]
pub struct NvidiaGateway {
    smi: String,
    settings: String,
    runner: CommandRunner,
}

impl NvidiaGateway {
    /// Create a gateway using the given tool paths
    pub fn new(smi: impl Into<String>, settings: impl Into<String>, timeout: Duration) -> Self {
        Self {
            smi: smi.into(),
            settings: settings.into(),
            runner: CommandRunner::new(timeout),
        }
    }

    /// Create a gateway from the `[commands]` configuration section
    pub fn from_config(config: &CommandsConfig) -> Self {
        Self::new(
            config.nvidia_smi.clone(),
            config.nvidia_settings.clone(),
            Duration::from_millis(config.timeout_ms),
        )
    }

    fn assign(&self, assignments: &[String]) -> Result<(), String> {
        let mut args = Vec::with_capacity(assignments.len() * 2);
        for assignment in assignments {
            args.push("--assign".to_string());
            args.push(assignment.clone());
        }
        self.runner
            .run(&self.settings, &args)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

impl DeviceGateway for NvidiaGateway {
    fn list_devices(&self) -> Result<Vec<DeviceHandle>, GatewayError> {
        let args = ["--query-gpu=index", "--format=csv,noheader"].map(String::from);
        let stdout = self
            .runner
            .run(&self.smi, &args)
            .map_err(|e| GatewayError::Discovery(e.to_string()))?;

        let devices = parse_device_list(&stdout).map_err(GatewayError::Discovery)?;
        if devices.is_empty() {
            return Err(GatewayError::Discovery(format!(
                "{} reported no GPUs",
                self.smi
            )));
        }
        Ok(devices)
    }

    fn read_temperature(&self, device: DeviceHandle) -> Result<Temperature, GatewayError> {
        let args = [
            "--query-gpu=temperature.gpu".to_string(),
            "--format=csv,noheader,nounits".to_string(),
            format!("--id={}", device.index()),
        ];
        let sensor_error = |reason: String| GatewayError::SensorRead {
            index: device.index(),
            reason,
        };

        let stdout = self
            .runner
            .run(&self.smi, &args)
            .map_err(|e| sensor_error(e.to_string()))?;
        parse_temperature(&stdout).map_err(sensor_error)
    }

    fn set_fan_speed(&self, command: FanCommand) -> Result<(), GatewayError> {
        let index = command.device.index();
        log::debug!("Setting new fan speed: {}", command);
        self.assign(&[
            format!("[gpu:{}]/GPUFanControlState=1", index),
            format!(
                "[fan:{}]/GPUTargetFanSpeed={}",
                index,
                command.speed.as_percentage()
            ),
        ])
        .map_err(|reason| GatewayError::Actuation { index, reason })
    }

    fn set_auto_fan_control(&self, device: DeviceHandle) -> Result<(), GatewayError> {
        let index = device.index();
        log::debug!("Disabling manual fan control on {}", device);
        self.assign(&[format!("[gpu:{}]/GPUFanControlState=0", index)])
            .map_err(|reason| GatewayError::Actuation { index, reason })
    }
}

/// Parse `nvidia-smi --query-gpu=index` output, one index per line
pub fn parse_device_list(stdout: &str) -> Result<Vec<DeviceHandle>, String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            line.parse::<u32>()
                .map(DeviceHandle::new)
                .map_err(|_| format!("unexpected GPU index '{}'", line))
        })
        .collect()
}

/// Parse a single temperature value in Celsius
pub fn parse_temperature(stdout: &str) -> Result<Temperature, String> {
    let mut values = stdout.lines().map(str::trim).filter(|l| !l.is_empty());
    let value = values
        .next()
        .ok_or_else(|| "empty temperature output".to_string())?;
    if values.next().is_some() {
        return Err(format!("expected one temperature, got '{}'", stdout.trim()));
    }

    let celsius: f64 = value
        .parse()
        .map_err(|_| format!("unparseable temperature '{}'", value))?;
    Temperature::new(celsius).map_err(|e| e.to_string())
}
