//! Command handlers
//!
//! Each command handler orchestrates the execution of a CLI command.

pub mod config;
pub mod list;
pub mod run;

pub use config::run_config;
pub use list::run_list;
pub use run::run_control;

use crate::cli::args::{Cli, RunArgs};
use crate::config::{Config, ConfigBuilder};
use crate::error::Result;

/// Merge the config file with CLI overrides and validate the result
///
/// `run` is `None` for commands that take no tuning overrides.
pub fn resolve_config(cli: &Cli, run: Option<&RunArgs>) -> Result<Config> {
    let mut builder = ConfigBuilder::new()
        .with_file(cli.config.as_deref())?
        .with_verbose(cli.verbose_override())
        .with_dry_run(cli.dry_run_override());

    if let Some(args) = run {
        builder = builder
            .with_target_temperature(args.target)
            .with_interval(args.interval)
            .with_gains(args.kp, args.ki, args.kd)
            .with_fan_bounds(args.min_speed, args.max_speed)
            .with_max_integral(args.max_integral)
            .with_ceiling_margin(args.ceiling_margin)
            .with_gpu_indices(&args.gpus);
    }

    let config = builder.build();
    config.validate()?;

    if config.general.verbose {
        log::set_max_level(log::LevelFilter::Debug);
    }
    Ok(config)
}
