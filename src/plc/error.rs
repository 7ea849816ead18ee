// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error taxonomy for PLC communication and decoding
//!
//! Every variant is recoverable at the polling boundary: the polling loop turns
//! them into a simulated snapshot. `UnknownAttribute` and `InvalidMap` are only
//! fatal while the register map is validated at startup.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the PLC layer
#[derive(Debug, Error)]
pub enum PlcError {
    /// The transport could not be opened
    #[error("PLC connection failed: {0}")]
    Connect(#[from] ConnectError),

    /// A read on an open transport failed
    #[error("PLC read failed: {0}")]
    Read(#[from] ReadError),

    /// The raw block does not cover every mapped signal
    #[error("raw block too short: {needed} bytes needed, {actual} received")]
    ShortBuffer { needed: usize, actual: usize },

    /// The register map has no entry for this pump/attribute pair
    #[error("unknown attribute '{attribute}' for pump {pump_id}")]
    UnknownAttribute { pump_id: u8, attribute: String },

    /// The register map failed startup validation
    #[error("invalid register map: {0}")]
    InvalidMap(String),
}

/// Reasons a connect attempt did not produce a usable transport
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("connect to {address} timed out after {timeout:?}")]
    Timeout { address: String, timeout: Duration },

    #[error("network error talking to {address}: {source}")]
    Io {
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// The device answered but refused the session (wrong rack/slot, busy, ...)
    #[error("device rejected the connection: {0}")]
    Rejected(String),

    /// The reconnect policy deferred this attempt
    #[error("reconnect deferred for another {remaining:?} after {failures} failures")]
    Backoff { remaining: Duration, failures: u32 },
}

/// Reasons a block read failed on an established transport
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("no open PLC connection")]
    NotConnected,

    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device answered with an error code for the requested area
    #[error("device returned error code 0x{code:02X} ({reason})")]
    Device { code: u16, reason: &'static str },

    /// The device answer could not be parsed
    #[error("malformed response: {0}")]
    Protocol(String),
}
