// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Dashboard web server
//!
//! Read-only HTTP API over the snapshot store, the connection status, the
//! event history and the sample history, plus a server-sent event stream of published snapshots.
//! Handlers never talk to the PLC.

pub mod api;
pub mod cors;
pub mod payload;
pub mod server;
pub mod stream;

use std::sync::Arc;
use tokio::sync::watch;

use crate::acquisition::{EventHistory, PushDispatcher, SampleHistory, SnapshotStore};
use crate::plc::{ConnectionStatus, RegisterMap};

/// Everything the request handlers read, managed by Rocket
#[derive(Clone)]
pub struct DashboardState {
    pub store: SnapshotStore,
    pub dispatcher: Arc<PushDispatcher>,
    pub map: Arc<RegisterMap>,
    pub history: Arc<EventHistory>,
    pub samples: Arc<SampleHistory>,
    pub connection: watch::Receiver<ConnectionStatus>,
}

impl DashboardState {
    pub fn plc_connected(&self) -> bool {
        self.connection.borrow().is_connected()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection.borrow().clone()
    }
}
