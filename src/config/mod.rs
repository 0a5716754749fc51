//! Configuration system
//!
//! Handles TOML config file parsing and CLI argument merging. Everything is
//! validated here, before the control loop starts.

pub mod builder;
pub mod file;

pub use builder::ConfigBuilder;
pub use file::ConfigFile;

use crate::domain::{ControlParameters, FanSpeed};
use crate::error::ConfigError;
use crate::services::RunOptions;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// GPU selection settings
    pub gpu: GpuConfig,
    /// PID tuning
    pub control: ControlConfig,
    /// Fan speed bounds
    pub fan: FanConfig,
    /// Over-temperature override
    pub safety: SafetyConfig,
    /// Driver tool locations
    pub commands: CommandsConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,
    /// Dry run mode
    pub dry_run: bool,
    /// Control loop interval in seconds
    pub interval_seconds: f64,
    /// Don't resend a fan speed equal to the last one applied (the
    /// full-speed override is always sent)
    pub skip_unchanged: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            dry_run: false,
            interval_seconds: 2.0,
            skip_unchanged: true,
        }
    }
}

/// GPU selection configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct GpuConfig {
    /// GPU indices to control; empty means all
    pub indices: Vec<u32>,
}

/// PID controller configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlConfig {
    /// Temperature to stay below, in Celsius
    pub target_temperature: f64,
    /// Proportional gain
    pub kp: f64,
    /// Integral gain
    pub ki: f64,
    /// Derivative gain
    pub kd: f64,
    /// Anti-windup bound on the integral accumulator
    pub max_integral: f64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            target_temperature: 60.0,
            kp: 2.0,
            ki: 0.5,
            kd: 0.1,
            max_integral: 50.0,
        }
    }
}

/// Fan bound configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FanConfig {
    /// Lowest speed the controller will command (percent)
    pub min_speed: u8,
    /// Highest speed the controller will command (percent)
    pub max_speed: u8,
}

impl Default for FanConfig {
    fn default() -> Self {
        Self {
            min_speed: 30,
            max_speed: 100,
        }
    }
}

/// Safety override configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SafetyConfig {
    /// Degrees above target at which fans are forced to 100%
    pub ceiling_margin: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            ceiling_margin: ControlParameters::DEFAULT_CEILING_MARGIN,
        }
    }
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CommandsConfig {
    /// Path or name of `nvidia-smi`
    pub nvidia_smi: String,
    /// Path or name of `nvidia-settings`
    pub nvidia_settings: String,
    /// Per-invocation timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            nvidia_smi: "nvidia-smi".to_string(),
            nvidia_settings: "nvidia-settings".to_string(),
            timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Convert to validated control parameters
    pub fn to_params(&self) -> Result<ControlParameters, ConfigError> {
        let sample_interval = Duration::try_from_secs_f64(self.general.interval_seconds)
            .map_err(|_| {
                ConfigError::invalid(
                    "general.interval_seconds",
                    format!("{} is not a valid duration", self.general.interval_seconds),
                )
            })?;
        let min_fan = FanSpeed::new(self.fan.min_speed)
            .map_err(|e| ConfigError::invalid("fan.min_speed", e.to_string()))?;
        let max_fan = FanSpeed::new(self.fan.max_speed)
            .map_err(|e| ConfigError::invalid("fan.max_speed", e.to_string()))?;

        let params = ControlParameters {
            target_temperature: self.control.target_temperature,
            kp: self.control.kp,
            ki: self.control.ki,
            kd: self.control.kd,
            sample_interval,
            min_fan,
            max_fan,
            max_integral: self.control.max_integral,
            ceiling_margin: self.safety.ceiling_margin,
        };
        params.validate()?;
        Ok(params)
    }

    /// Options for the loop that are not controller tuning
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            devices: self.gpu.indices.clone(),
            skip_unchanged: self.general.skip_unchanged,
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_params()?;
        if self.commands.timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "commands.timeout_ms",
                "must be greater than zero",
            ));
        }
        for (key, program) in [
            ("commands.nvidia_smi", &self.commands.nvidia_smi),
            ("commands.nvidia_settings", &self.commands.nvidia_settings),
        ] {
            if program.trim().is_empty() {
                return Err(ConfigError::invalid(key, "must not be empty"));
            }
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}
