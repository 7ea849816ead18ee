// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Dashboard server configuration
//!
//! This module defines the structure for configuring the web server that
//! exposes the pump snapshots to the dashboard.

use serde::{Deserialize, Serialize};

/// Configuration for the dashboard web server.
///
/// ### TLS Configuration
///
/// For HTTPS, both `cert` and `key` must be provided as Base64-encoded PEM
/// files. When both are absent the server runs in plain HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisualizationConfig {
    /// The TCP port the server will listen on.
    ///
    /// Valid range is 1-65534. Default value is 8080.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The network address the server will bind to.
    ///
    /// Default is "127.0.0.1". Use "0.0.0.0" to bind to all IPv4 interfaces.
    #[serde(default = "default_address")]
    pub address: String,

    /// The server name reported in HTTP headers and logs.
    #[serde(default = "default_name")]
    pub name: String,

    /// SSL/TLS certificate in PEM format, Base64 encoded.
    #[serde(default)]
    pub cert: Option<String>,

    /// SSL/TLS private key in PEM format, Base64 encoded.
    #[serde(default)]
    pub key: Option<String>,

    /// Enable or disable the web server. Default is `true`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_name() -> String {
    format!("PumpScadaServer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_enabled() -> bool {
    true
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            address: default_address(),
            name: default_name(),
            cert: None,
            key: None,
            enabled: default_enabled(),
        }
    }
}
