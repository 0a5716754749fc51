//! Command-line interface
//!
//! Argument definitions for `nvfan` and the formatting of command output.

pub mod args;
pub mod output;

pub use args::{Cli, Commands, OutputFormat, RunArgs};
