//! Output formatting utilities
//!
//! Provides table and JSON output formatting for CLI commands.

use crate::cli::args::OutputFormat;
use crate::domain::{DeviceHandle, Temperature};
use crate::error::GatewayError;
use serde::Serialize;
use std::io::{self, Write};

/// Format and print output based on the selected format
pub fn print_output<T: Serialize + TableDisplay>(data: &T, format: OutputFormat) -> io::Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();

    match format {
        OutputFormat::Table => {
            writeln!(handle, "{}", data.to_table())?;
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string());
            writeln!(handle, "{}", json)?;
        }
        OutputFormat::Compact => {
            writeln!(handle, "{}", data.to_compact())?;
        }
    }

    Ok(())
}

/// Trait for types that can be displayed as a table
pub trait TableDisplay {
    /// Format as a table string
    fn to_table(&self) -> String;

    /// Format as a compact single line
    fn to_compact(&self) -> String {
        self.to_table().replace('\n', " | ")
    }
}

/// One GPU in the `list` output
#[derive(Debug, Clone, Serialize)]
pub struct DeviceListEntry {
    pub index: u32,
    /// Die temperature in Celsius, absent when the read failed
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceListEntry {
    pub fn new(device: DeviceHandle, reading: Result<Temperature, GatewayError>) -> Self {
        match reading {
            Ok(t) => Self {
                index: device.index(),
                temperature: Some(t.as_celsius()),
                error: None,
            },
            Err(e) => Self {
                index: device.index(),
                temperature: None,
                error: Some(e.to_string()),
            },
        }
    }
}

impl TableDisplay for DeviceListEntry {
    fn to_table(&self) -> String {
        match (self.temperature, &self.error) {
            (Some(t), _) => format!("[{}] GPU {}: {:.0}°C", self.index, self.index, t),
            (None, Some(e)) => format!("[{}] GPU {}: unavailable ({})", self.index, self.index, e),
            (None, None) => format!("[{}] GPU {}: unavailable", self.index, self.index),
        }
    }

    fn to_compact(&self) -> String {
        match self.temperature {
            Some(t) => format!("{}:{:.0}", self.index, t),
            None => format!("{}:-", self.index),
        }
    }
}

/// Device list for display
#[derive(Debug, Clone, Serialize)]
pub struct DeviceList {
    pub devices: Vec<DeviceListEntry>,
}

impl TableDisplay for DeviceList {
    fn to_table(&self) -> String {
        let mut output = format!("GPUs Found: {}\n\n", self.devices.len());

        for device in &self.devices {
            output.push_str(&device.to_table());
            output.push('\n');
        }

        output
    }

    fn to_compact(&self) -> String {
        self.devices
            .iter()
            .map(|d| d.to_compact())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
