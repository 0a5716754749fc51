//! List command implementation
//!
//! Lists all detected NVIDIA GPUs with their current temperature.

use crate::cli::args::Cli;
use crate::cli::output::{print_output, DeviceList, DeviceListEntry};
use crate::commands::resolve_config;
use crate::error::Result;
use crate::gateway::{DeviceGateway, NvidiaGateway};

/// Execute the list command
pub fn run_list(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli, None)?;
    let gateway = NvidiaGateway::from_config(&config.commands);

    let device_list = collect_devices(&gateway)?;
    print_output(&device_list, cli.format)?;

    Ok(())
}

/// Enumerate devices and read each temperature once
///
/// A failed read is reported on its entry rather than failing the listing.
pub fn collect_devices<G: DeviceGateway + ?Sized>(gateway: &G) -> Result<DeviceList> {
    let devices = gateway
        .list_devices()?
        .into_iter()
        .map(|device| DeviceListEntry::new(device, gateway.read_temperature(device)))
        .collect();

    Ok(DeviceList { devices })
}
