//! Configuration builder
//!
//! Merges configuration from files and CLI arguments.

use crate::config::{Config, ConfigFile};
use crate::error::ConfigError;

/// Builder for merging configuration sources
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load configuration from a file, or from the default locations
    ///
    /// An explicitly named file must exist.
    pub fn with_file(mut self, path: Option<&str>) -> Result<Self, ConfigError> {
        let file_config = match path {
            Some(path) => Some(ConfigFile::load(path)?),
            None => ConfigFile::load_default()?,
        };

        if let Some(cfg) = file_config {
            self.config = cfg;
        }

        Ok(self)
    }

    /// Override with CLI verbose flag
    pub fn with_verbose(mut self, verbose: Option<bool>) -> Self {
        if let Some(v) = verbose {
            self.config.general.verbose = v;
        }
        self
    }

    /// Override with CLI dry-run flag
    pub fn with_dry_run(mut self, dry_run: Option<bool>) -> Self {
        if let Some(d) = dry_run {
            self.config.general.dry_run = d;
        }
        self
    }

    /// Override with CLI interval
    pub fn with_interval(mut self, seconds: Option<f64>) -> Self {
        if let Some(s) = seconds {
            self.config.general.interval_seconds = s;
        }
        self
    }

    /// Override with CLI GPU indices (empty keeps the file's selection)
    pub fn with_gpu_indices(mut self, indices: &[u32]) -> Self {
        if !indices.is_empty() {
            self.config.gpu.indices = indices.to_vec();
        }
        self
    }

    /// Override with CLI target temperature
    pub fn with_target_temperature(mut self, celsius: Option<f64>) -> Self {
        if let Some(t) = celsius {
            self.config.control.target_temperature = t;
        }
        self
    }

    /// Override any of the PID gains
    pub fn with_gains(mut self, kp: Option<f64>, ki: Option<f64>, kd: Option<f64>) -> Self {
        if let Some(kp) = kp {
            self.config.control.kp = kp;
        }
        if let Some(ki) = ki {
            self.config.control.ki = ki;
        }
        if let Some(kd) = kd {
            self.config.control.kd = kd;
        }
        self
    }

    /// Override with CLI integral bound
    pub fn with_max_integral(mut self, bound: Option<f64>) -> Self {
        if let Some(b) = bound {
            self.config.control.max_integral = b;
        }
        self
    }

    /// Override with CLI fan bounds
    pub fn with_fan_bounds(mut self, min: Option<u8>, max: Option<u8>) -> Self {
        if let Some(min) = min {
            self.config.fan.min_speed = min;
        }
        if let Some(max) = max {
            self.config.fan.max_speed = max;
        }
        self
    }

    /// Override with CLI ceiling margin
    pub fn with_ceiling_margin(mut self, margin: Option<f64>) -> Self {
        if let Some(m) = margin {
            self.config.safety.ceiling_margin = m;
        }
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
