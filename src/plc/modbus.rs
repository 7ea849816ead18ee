// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP access to the pump data block
//!
//! Some controllers publish the data block through a Modbus server instead of
//! S7 communication. The block is then mapped onto consecutive holding
//! registers starting at `register_base`: byte `n` of the block is the high
//! byte of register `base + n / 2` when `n` is even and its low byte when `n`
//! is odd. This keeps the big-endian byte image expected by the decoder.

use async_trait::async_trait;
use log::{debug, info};
use std::net::SocketAddr;
use tokio_modbus::prelude::*;

use super::error::{ConnectError, PlcError, ReadError};
use super::PlcTransport;
use crate::config::PlcConfig;

/// Standard Modbus TCP port
pub const MODBUS_TCP_PORT: u16 = 502;

/// Protocol limit for one read holding registers request
pub const MAX_REGISTERS_PER_READ: usize = 125;

/// Holding register view of the registers covering `start..start + length`
///
/// Returns the first register index relative to the base and the register count.
pub fn register_window(start: usize, length: usize) -> (usize, usize) {
    let first = start / 2;
    let end = (start + length).div_ceil(2);
    (first, end - first)
}

/// Data block reader over Modbus TCP
pub struct ModbusTransport {
    address: String,
    port: u16,
    unit_id: u8,
    register_base: u16,
    ctx: Option<tokio_modbus::client::Context>,
}

impl ModbusTransport {
    pub fn new(address: impl Into<String>, port: u16, unit_id: u8, register_base: u16) -> Self {
        Self {
            address: address.into(),
            port,
            unit_id,
            register_base,
            ctx: None,
        }
    }

    pub fn from_config(config: &PlcConfig) -> Self {
        Self::new(
            config.address.clone(),
            config.effective_port(),
            config.modbus_unit_id,
            config.modbus_register_base,
        )
    }

    /// First socket address of `endpoint`
    ///
    /// No `&self` may live across the lookup: the tokio-modbus context is not
    /// `Sync` and the connect future must be `Send`.
    async fn resolve(endpoint: String) -> Result<SocketAddr, PlcError> {
        let io_error = |source: std::io::Error| ConnectError::Io {
            address: endpoint.clone(),
            source,
        };
        let resolved = tokio::net::lookup_host(endpoint.as_str())
            .await
            .map_err(io_error)?
            .next()
            .ok_or_else(|| {
                io_error(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "address did not resolve",
                ))
            })?;
        Ok(resolved)
    }
}

#[async_trait]
impl PlcTransport for ModbusTransport {
    async fn connect(&mut self) -> Result<(), PlcError> {
        self.disconnect().await;

        let socket_addr = Self::resolve(self.endpoint()).await?;
        let ctx = tcp::connect_slave(socket_addr, Slave(self.unit_id))
            .await
            .map_err(|source| ConnectError::Io {
                address: self.endpoint(),
                source,
            })?;

        info!(
            "Modbus session open with {} (unit {}, register base {})",
            socket_addr, self.unit_id, self.register_base
        );
        self.ctx = Some(ctx);
        Ok(())
    }

    async fn read_area(
        &mut self,
        db_number: u16,
        start: u16,
        length: u16,
    ) -> Result<Vec<u8>, PlcError> {
        let ctx = self.ctx.as_mut().ok_or(ReadError::NotConnected)?;
        let (first, count) = register_window(start as usize, length as usize);
        if self.register_base as usize + first + count > u16::MAX as usize + 1 {
            return Err(ReadError::Protocol(format!(
                "bytes {}..{} fall outside the register space",
                start,
                start as usize + length as usize
            ))
            .into());
        }
        debug!(
            "Modbus read of DB{} bytes {}..{} as {} registers",
            db_number,
            start,
            start as usize + length as usize,
            count
        );

        let mut words = Vec::with_capacity(count);
        while words.len() < count {
            let chunk = MAX_REGISTERS_PER_READ.min(count - words.len());
            let address = (self.register_base as usize + first + words.len()) as u16;
            let registers = ctx
                .read_holding_registers(address, chunk as u16)
                .await
                .map_err(|e| ReadError::Protocol(e.to_string()))?
                .map_err(|code| ReadError::Protocol(format!("Modbus exception {:?}", code)))?;
            if registers.len() != chunk {
                return Err(ReadError::Protocol(format!(
                    "asked for {} registers, got {}",
                    chunk,
                    registers.len()
                ))
                .into());
            }
            words.extend(registers);
        }

        let skip = start as usize % 2;
        Ok(words
            .iter()
            .flat_map(|word| word.to_be_bytes())
            .skip(skip)
            .take(length as usize)
            .collect())
    }

    async fn disconnect(&mut self) {
        if let Some(mut ctx) = self.ctx.take() {
            if let Err(e) = ctx.disconnect().await {
                debug!("Modbus disconnect from {}: {}", self.endpoint(), e);
            }
        }
    }

    fn is_open(&self) -> bool {
        self.ctx.is_some()
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}
