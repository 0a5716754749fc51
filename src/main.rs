//! nvfan - PID fan controller for NVIDIA GPUs
//!
//! Keeps each GPU near a target temperature and restores automatic fan
//! control when terminated.

use clap::Parser;
use nvfan::cli::args::{generate_completions, Cli, Commands};
use nvfan::commands::{run_config, run_control, run_list};
use nvfan::error::{AppError, ConfigError, GatewayError};

fn main() {
    let cli = Cli::parse();

    // Debug records pass the logger filter; the global max level gates them
    // so a `verbose = true` config file can raise it later. RUST_LOG wins.
    let rust_log_set = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .format_timestamp_secs()
        .init();
    if !cli.verbose && !rust_log_set {
        log::set_max_level(log::LevelFilter::Info);
    }

    // Run the appropriate command
    let result = run(&cli);

    if let Err(e) = result {
        log::error!("{}", e);
        print_error(&e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    match &cli.command {
        Commands::Run(args) => run_control(cli, args),

        Commands::List => run_list(cli),

        Commands::Config => run_config(cli),

        Commands::Completions { shell } => {
            generate_completions(*shell);
            Ok(())
        }
    }
}

fn print_error(err: &AppError) {
    eprintln!("Error: {}", err);

    // Print helpful hints for common errors
    match err {
        AppError::Gateway(GatewayError::Discovery(_)) => {
            eprintln!();
            eprintln!("Hint: Make sure the NVIDIA driver is installed.");
            eprintln!("      Check 'nvidia-smi' for GPU detection.");
        }
        AppError::Gateway(GatewayError::Actuation { .. }) => {
            eprintln!();
            eprintln!("Hint: Manual fan control needs a running X server and");
            eprintln!("      Coolbits enabled in the NVIDIA X configuration.");
        }
        AppError::Config(ConfigError::FileNotFound(_)) => {
            eprintln!();
            eprintln!("Hint: Pass an existing file with --config, or omit it");
            eprintln!("      to search the default locations.");
        }
        _ => {}
    }
}
