// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PLC access layer
//!
//! This module contains everything that touches the controller:
//!
//! - [`register_map`]: fixed layout of the pump data block
//! - [`decoder`]: raw block to typed snapshot conversion
//! - [`connection`]: connection lifecycle, timeouts and reconnect policy
//! - [`s7`] and [`modbus`]: the two wire transports
//!
//! All reads go through one [`connection::ConnectionManager`] owned by the
//! polling task, so a transport is never used from two tasks at once.

pub mod connection;
pub mod decoder;
pub mod error;
pub mod modbus;
pub mod register_map;
pub mod s7;

use async_trait::async_trait;

use crate::config::{PlcConfig, TransportKind};

pub use connection::{ConnectionManager, ConnectionSettings, ConnectionState, ConnectionStatus};
pub use decoder::decode;
pub use error::{ConnectError, PlcError, ReadError};
pub use register_map::{Attribute, RegisterEntry, RegisterMap, Signal, ValueKind};

/// Byte-level access to a PLC data block
///
/// Implementations keep at most one open session. Dropping a transport
/// releases its socket.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlcTransport: Send {
    /// Open the session; errors are reported as [`PlcError::Connect`]
    async fn connect(&mut self) -> Result<(), PlcError>;

    /// Read `length` bytes of data block `db_number` starting at byte `start`
    async fn read_area(
        &mut self,
        db_number: u16,
        start: u16,
        length: u16,
    ) -> Result<Vec<u8>, PlcError>;

    /// Close the session; a no-op when nothing is open
    async fn disconnect(&mut self);

    fn is_open(&self) -> bool;

    /// Human readable peer description for logs and the status API
    fn endpoint(&self) -> String;
}

/// Build the transport selected in the configuration
pub fn transport_from_config(config: &PlcConfig) -> Box<dyn PlcTransport> {
    match config.transport {
        TransportKind::S7 => Box::new(s7::S7Transport::from_config(config)),
        TransportKind::Modbus => Box::new(modbus::ModbusTransport::from_config(config)),
    }
}
