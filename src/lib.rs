//! nvfan - PID fan control for NVIDIA GPUs
//!
//! This library holds each GPU near a target temperature by driving its fan
//! with a PID controller, and hands fan control back to the driver on exit.
//!
//! # Modules
//!
//! - [`cli`]: Command-line interface definitions
//! - [`commands`]: Command handlers
//! - [`config`]: Configuration system
//! - [`domain`]: Domain models with validation
//! - [`error`]: Error types
//! - [`gateway`]: Device access through the NVIDIA driver tools
//! - [`services`]: Controller, control loop and shutdown handling

pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod services;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use error::{AppError, Result};
