//! Process entry point for the controller
//!
//! Wires the gateway, the control loop and the shutdown handler together.

use crate::domain::ControlParameters;
use crate::error::Result;
use crate::gateway::DeviceGateway;
use crate::services::control_loop::ControlLoop;
use crate::services::shutdown::{install_signal_handler, ShutdownHandler, StopSignal};

use std::sync::Arc;

/// Options that shape the loop but are not controller tuning
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// GPU indices to control; empty means every enumerated GPU
    pub devices: Vec<u32>,
    /// Skip sending a speed equal to the last one applied
    pub skip_unchanged: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            devices: Vec::new(),
            skip_unchanged: true,
        }
    }
}

/// Run the controller until SIGINT/SIGTERM/SIGHUP, then restore auto control
///
/// Configuration and discovery errors are returned before any fan is
/// touched; the caller turns them into a non-zero exit status.
pub fn run<G: DeviceGateway>(
    gateway: G,
    params: ControlParameters,
    options: RunOptions,
) -> Result<()> {
    let stop = StopSignal::new();
    install_signal_handler(&stop)?;
    run_until_stopped(Arc::new(gateway), params, options, stop)
}

/// Run the controller until `stop` is raised
///
/// Automatic fan control is restored on every controlled device exactly
/// once before this returns, whether the loop ended normally or not.
pub fn run_until_stopped<G: DeviceGateway + ?Sized>(
    gateway: Arc<G>,
    params: ControlParameters,
    options: RunOptions,
    stop: StopSignal,
) -> Result<()> {
    params.validate()?;

    let shutdown = ShutdownHandler::new(Arc::clone(&gateway), stop.clone());
    let mut control = ControlLoop::new(gateway, params, stop)
        .with_selection(options.devices)
        .with_skip_unchanged(options.skip_unchanged);

    control.start()?;
    shutdown.register_devices(&control.devices());

    let result = control.run();
    let restored = shutdown.restore();
    log::info!(
        "Restored automatic fan control on {}/{} GPU(s)",
        restored,
        control.devices().len()
    );
    result
}
