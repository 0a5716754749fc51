//! Device access layer
//!
//! Provides a trait-based abstraction over the driver tools for testability.

pub mod command;
pub mod dry_run;
pub mod nvidia;
pub mod traits;

pub use command::CommandRunner;
pub use dry_run::DryRunGateway;
pub use nvidia::NvidiaGateway;
pub use traits::DeviceGateway;
