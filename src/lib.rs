// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust pump SCADA library
//!
//! Polls the data block of the PLC driving a seven-pump station, keeps the
//! latest decoded snapshot and serves it to a monitoring dashboard.
//!
//! - [`plc`]: register map, decoder, transports and connection management
//! - [`acquisition`]: polling loop, snapshot store, fan-out and event history
//! - [`visualization`]: HTTP API and event stream
//! - [`config`] and [`daemon`]: application wiring

pub mod acquisition;
pub mod config;
pub mod daemon;
pub mod plc;
pub mod visualization;
