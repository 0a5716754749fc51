//! CLI argument definitions using clap derive
//!
//! Defines all command-line arguments and subcommands.

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

/// PID fan controller for NVIDIA GPUs
///
/// Holds each GPU near a target temperature and hands fan control back to
/// the driver on exit.
#[derive(Parser, Debug)]
#[command(name = "nvfan")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "NVFAN_CONFIG")]
    pub config: Option<String>,

    /// Dry run mode - log fan changes instead of applying them
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Flag values as config overrides; an absent flag keeps the file value
    pub fn verbose_override(&self) -> Option<bool> {
        self.verbose.then_some(true)
    }

    pub fn dry_run_override(&self) -> Option<bool> {
        self.dry_run.then_some(true)
    }
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the fan controller
    Run(RunArgs),

    /// List GPUs and their current temperatures
    List,

    /// Print the effective configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Arguments for the run command
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Target temperature in Celsius
    #[arg(short, long, value_name = "CELSIUS")]
    pub target: Option<f64>,

    /// Control loop interval in seconds
    #[arg(short, long, value_name = "SECONDS")]
    pub interval: Option<f64>,

    /// Proportional gain
    #[arg(long)]
    pub kp: Option<f64>,

    /// Integral gain
    #[arg(long)]
    pub ki: Option<f64>,

    /// Derivative gain
    #[arg(long)]
    pub kd: Option<f64>,

    /// Minimum fan speed percentage
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_speed: Option<u8>,

    /// Maximum fan speed percentage
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
    pub max_speed: Option<u8>,

    /// Bound on the integral accumulator
    #[arg(long)]
    pub max_integral: Option<f64>,

    /// Degrees above target at which fans are forced to 100%
    #[arg(long, value_name = "CELSIUS")]
    pub ceiling_margin: Option<f64>,

    /// GPU index to control (repeatable; default is all GPUs)
    #[arg(long = "gpu", value_name = "INDEX")]
    pub gpus: Vec<u32>,
}

/// Output format
#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format for machine parsing
    Json,
    /// Compact single-line format
    Compact,
}

/// Generate shell completions and print to stdout
pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
}
