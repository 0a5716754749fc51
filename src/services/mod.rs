//! Service layer for fan control
//!
//! The controller, the safety clamp, the loop that drives them, and the
//! shutdown path that hands control back to the driver.

pub mod control_loop;
pub mod pid;
pub mod runner;
pub mod safety;
pub mod shutdown;

pub use control_loop::{ControlLoop, DeviceOutcome, LoopState, TickReport};
pub use pid::{ControllerState, PidController};
pub use runner::{run, run_until_stopped, RunOptions};
pub use safety::SafetyClamp;
pub use shutdown::{install_signal_handler, ShutdownHandler, StopSignal};
