// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the pump monitoring application
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before it is deserialized.
//!
//! ## Configuration Structure
//!
//! - `plc`: controller address, transport and data block location
//! - `polling`: acquisition period, reconnect backoff and buffer sizes
//! - `visualization`: settings of the dashboard web server
//!
//! ## Usage
//!
//! ```no_run
//! use rust_pump_scada::config::{Config, ConfigOverrides};
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! config.apply_args(ConfigOverrides {
//!     web_port: Some(8081),
//!     plc_address: Some("192.168.200.21".to_string()),
//!     ..Default::default()
//! });
//!
//! println!("PLC at {}", config.plc.address);
//! ```

pub mod plc;
pub mod polling;
pub mod utils;
pub mod visualization;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use plc::{PlcConfig, TransportKind};
pub use polling::PollingConfig;
pub use utils::{is_valid_ip_address, output_config_schema};
pub use visualization::VisualizationConfig;

/// Root configuration structure.
///
/// Each section falls back to its defaults when it is missing from the file,
/// so an empty YAML document is a valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Controller holding the pump data block.
    #[serde(default)]
    pub plc: PlcConfig,

    /// Acquisition loop settings.
    #[serde(default)]
    pub polling: PollingConfig,

    /// Settings for the dashboard web server.
    #[serde(default)]
    pub visualization: VisualizationConfig,
}

/// Command line values taking precedence over the configuration file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub web_port: Option<u16>,
    pub web_address: Option<String>,
    pub plc_address: Option<String>,
    pub plc_transport: Option<TransportKind>,
    pub db_number: Option<u16>,
    pub poll_interval_ms: Option<u64>,
    pub simulation_seed: Option<u64>,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let sample_path = path.as_ref().with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default configuration. An invalid
    /// one leaves a `*.sample.yaml` with defaults next to it and fails.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // An empty document parses as null and means "all defaults"
        let json_value = match serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })? {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            value => value,
        };

        let schema: serde_json::Value = serde_json::from_str(utils::CONFIG_SCHEMA)
            .context("Failed to parse JSON schema")?;
        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = match serde_json::from_value(json_value) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only the values present in `overrides` replace the loaded ones.
    pub fn apply_args(&mut self, overrides: ConfigOverrides) {
        if let Some(web_port) = overrides.web_port {
            debug!("Overriding port from command line: {}", web_port);
            self.visualization.port = web_port;
        }

        if let Some(web_address) = overrides.web_address {
            debug!("Overriding address from command line: {}", web_address);
            self.visualization.address = web_address;
        }

        if let Some(address) = overrides.plc_address {
            debug!("Overriding PLC address from command line: {}", address);
            self.plc.address = address;
        }

        if let Some(transport) = overrides.plc_transport {
            debug!("Overriding PLC transport from command line: {}", transport);
            self.plc.transport = transport;
        }

        if let Some(db_number) = overrides.db_number {
            debug!("Overriding data block number from command line: {}", db_number);
            self.plc.db_number = db_number;
        }

        if let Some(interval) = overrides.poll_interval_ms {
            debug!("Overriding poll interval from command line: {} ms", interval);
            self.polling.interval_ms = interval;
        }

        if let Some(seed) = overrides.simulation_seed {
            debug!("Overriding simulation seed from command line: {}", seed);
            self.polling.simulation_seed = Some(seed);
        }
    }
}
