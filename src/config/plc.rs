// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PLC connection configuration
//!
//! This module defines where the pump data block lives and how to reach it.

use serde::{Deserialize, Serialize};

/// Wire protocol used to read the data block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// S7 communication over ISO-on-TCP
    S7,
    /// Holding registers over Modbus TCP
    Modbus,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::S7 => write!(f, "s7"),
            TransportKind::Modbus => write!(f, "modbus"),
        }
    }
}

/// Settings of the controller holding the pump data block.
///
/// # Example
///
/// ```
/// use rust_pump_scada::config::{PlcConfig, TransportKind};
///
/// let plc = PlcConfig {
///     transport: TransportKind::Modbus,
///     address: "10.0.0.5".to_string(),
///     ..PlcConfig::default()
/// };
/// assert_eq!(plc.effective_port(), 502);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlcConfig {
    pub transport: TransportKind,

    /// Host name or IP address of the controller.
    pub address: String,

    /// TCP port; the protocol default (102 for S7, 502 for Modbus) when absent.
    pub port: Option<u16>,

    /// Rack of the CPU, used for the S7 connection TSAP.
    pub rack: u8,

    /// Slot of the CPU, used for the S7 connection TSAP.
    pub slot: u8,

    /// Data block holding the pump values.
    pub db_number: u16,

    /// Byte offset of the pump layout inside the data block.
    pub start_offset: u16,

    pub connect_timeout_ms: u64,

    pub read_timeout_ms: u64,

    /// Modbus unit identifier.
    pub modbus_unit_id: u8,

    /// Holding register mapped to byte 0 of the data block.
    pub modbus_register_base: u16,
}

impl Default for PlcConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::S7,
            address: "192.168.200.20".to_string(),
            port: None,
            rack: 0,
            slot: 1,
            db_number: 39,
            start_offset: 0,
            connect_timeout_ms: 3000,
            read_timeout_ms: 2000,
            modbus_unit_id: 1,
            modbus_register_base: 0,
        }
    }
}

impl PlcConfig {
    /// Port actually used, falling back to the protocol default
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(match self.transport {
            TransportKind::S7 => crate::plc::s7::ISO_TCP_PORT,
            TransportKind::Modbus => crate::plc::modbus::MODBUS_TCP_PORT,
        })
    }
}
