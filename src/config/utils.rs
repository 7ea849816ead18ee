// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use base64::Engine;
use log::debug;

use super::Config;
use crate::plc::RegisterMap;

/// JSON schema of the configuration file, embedded at build time
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_pump_scada --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Accepts any IPv4 or IPv6 address plus "localhost".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against rules the JSON schema cannot express.
///
/// # Validation Rules
///
/// - **SSL Configuration**: certificate and key are both present or both absent,
///   and both are valid base64
/// - **Port Range**: the web server port is within 1-65534
/// - **Timing**: poll interval and PLC timeouts are non-zero
/// - **Layout**: the pump data block fits in one read starting at `start_offset`
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if let Some(cert) = &config.visualization.cert {
        if config.visualization.key.is_none() {
            anyhow::bail!("SSL certificate provided without a key");
        }

        let _ = base64::engine::general_purpose::STANDARD
            .decode(cert)
            .context("SSL certificate is not valid base64")?;
    }

    if let Some(key) = &config.visualization.key {
        if config.visualization.cert.is_none() {
            anyhow::bail!("SSL key provided without a certificate");
        }

        let _ = base64::engine::general_purpose::STANDARD
            .decode(key)
            .context("SSL key is not valid base64")?;
    }

    if config.visualization.port < 1 || config.visualization.port > 65534 {
        anyhow::bail!("Invalid port number: {}", config.visualization.port);
    }

    if !is_valid_ip_address(&config.visualization.address) {
        // Host names are accepted, only reported
        debug!(
            "Potentially invalid address format: {}",
            config.visualization.address
        );
    }

    if config.plc.address.trim().is_empty() {
        anyhow::bail!("PLC address must not be empty");
    }

    if config.polling.interval_ms == 0 {
        anyhow::bail!("Poll interval must be greater than zero");
    }

    if config.plc.connect_timeout_ms == 0 || config.plc.read_timeout_ms == 0 {
        anyhow::bail!("PLC connect and read timeouts must be greater than zero");
    }

    let block_end = config.plc.start_offset as usize + RegisterMap::standard().required_len();
    if block_end > u16::MAX as usize {
        anyhow::bail!(
            "Pump data block at offset {} does not fit in the data block address space",
            config.plc.start_offset
        );
    }

    Ok(())
}
