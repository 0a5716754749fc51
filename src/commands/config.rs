//! Config command implementation
//!
//! Prints the effective configuration after file loading, CLI overrides and
//! validation.

use crate::cli::args::{Cli, OutputFormat};
use crate::commands::resolve_config;
use crate::config::Config;
use crate::error::{AppError, Result};

use std::io::{self, Write};

/// Execute the config command
pub fn run_config(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli, None)?;
    let rendered = render(&config, cli.format)?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", rendered.trim_end())?;

    Ok(())
}

fn render(config: &Config, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)
            .map_err(|e| AppError::Io(io::Error::new(io::ErrorKind::InvalidData, e))),
        OutputFormat::Table | OutputFormat::Compact => Ok(config.to_toml()?),
    }
}
