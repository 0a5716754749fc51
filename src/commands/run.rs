//! Run command implementation
//!
//! Starts the PID fan controller and blocks until a termination signal.

use crate::cli::args::{Cli, RunArgs};
use crate::commands::resolve_config;
use crate::error::Result;
use crate::gateway::{DeviceGateway, DryRunGateway, NvidiaGateway};
use crate::services;

/// Execute the run command
pub fn run_control(cli: &Cli, args: &RunArgs) -> Result<()> {
    let config = resolve_config(cli, Some(args))?;
    let params = config.to_params()?;
    let options = config.run_options();

    log::info!(
        "Starting fan controller: target {}°C, interval {:?}, fan {}..{}",
        params.target_temperature,
        params.sample_interval,
        params.min_fan,
        params.max_fan
    );
    log::debug!(
        "Gains kP={} kI={} kD={}, integral bound {}, ceiling {}°C",
        params.kp,
        params.ki,
        params.kd,
        params.max_integral,
        params.ceiling()
    );

    let nvidia = NvidiaGateway::from_config(&config.commands);
    let gateway: Box<dyn DeviceGateway> = if config.general.dry_run {
        log::info!("Dry run mode - fan changes will only be logged");
        Box::new(DryRunGateway::new(nvidia))
    } else {
        Box::new(nvidia)
    };

    services::run(gateway, params, options)
}
