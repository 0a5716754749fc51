//! Unified error types for nvfan
//!
//! This module defines all error types used throughout the application.
//! Uses thiserror for ergonomic error definitions.

use std::time::Duration;
use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from the device gateway
    #[error("Device error: {0}")]
    Gateway(#[from] GatewayError),

    /// Error from configuration parsing/validation
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error from domain type validation
    #[error("Domain validation error: {0}")]
    Domain(#[from] DomainError),

    /// Failed to register the termination signal handler
    #[error("Failed to install signal handler: {0}")]
    Signal(String),

    /// IO error (file operations, stdout)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the device gateway
///
/// Discovery failures are fatal; sensor and actuation failures are scoped to
/// a single device and a single tick.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Device enumeration failed or returned nothing
    #[error("Device discovery failed: {0}")]
    Discovery(String),

    /// Temperature could not be read
    #[error("Failed to read temperature of GPU {index}: {reason}")]
    SensorRead { index: u32, reason: String },

    /// Fan command was rejected or timed out
    #[error("Failed to set fan control on GPU {index}: {reason}")]
    Actuation { index: u32, reason: String },
}

/// Errors from invoking an external tool
#[derive(Error, Debug)]
pub enum CommandError {
    /// The program could not be started
    #[error("Failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program exited with a non-zero status
    #[error("{program} exited with {status}: {stderr}")]
    Status {
        program: String,
        status: String,
        stderr: String,
    },

    /// The program did not finish in time and was killed
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// Waiting on or reading from the child failed
    #[error("Failed to collect output of {program}: {source}")]
    Output {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from domain type validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid fan speed value (must be 0-100)
    #[error("Invalid fan speed: {0}% (must be 0-100)")]
    InvalidFanSpeed(u8),

    /// Invalid temperature value
    #[error("Invalid temperature: {0}")]
    InvalidTemperature(String),
}

/// Errors raised by the PID controller
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// The sample clock did not advance since the previous step
    #[error("Non-monotonic tick: no time elapsed since the previous sample")]
    NonMonotonicTick,
}

/// Errors from configuration parsing and validation
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    /// Failed to parse config file
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Invalid config value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),
}

impl ConfigError {
    /// Shorthand for an invalid value error
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
