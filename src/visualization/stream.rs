// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Server-sent event stream of published snapshots
//!
//! A client first receives a `connection_response` event holding the current
//! snapshot, then one `data_update` event per publication. When nothing is
//! published for five seconds a heartbeat keeps the connection open.
//!
//! ```text
//! event: connection_response
//! data: {"data": {...}, "plc_connected": true}
//!
//! event: data_update
//! data: {"system_alarm": false, "pump_1": {...}, ...}
//!
//! data: {"type":"heartbeat"}
//! ```

use rocket::futures::Stream;
use rocket::response::stream::{Event, EventStream};
use rocket::{get, Shutdown, State};
use serde::Serialize;
use std::time::Duration;
use tokio::time::timeout;

use super::payload::DashboardPayload;
use super::DashboardState;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Serialize)]
struct ConnectionResponse {
    data: DashboardPayload,
    plc_connected: bool,
}

#[get("/stream")]
pub fn stream_snapshots(
    state: &State<DashboardState>,
    mut shutdown: Shutdown,
) -> EventStream<impl Stream<Item = Event>> {
    let state = state.inner().clone();
    let mut consumer = state.dispatcher.subscribe();

    EventStream! {
        let plc_connected = state.plc_connected();
        let greeting = ConnectionResponse {
            data: DashboardPayload::new(&state.store.current(), &state.map, plc_connected),
            plc_connected,
        };
        yield Event::json(&greeting).event("connection_response");

        loop {
            let next = rocket::tokio::select! {
                next = timeout(HEARTBEAT_INTERVAL, consumer.next_snapshot()) => next,
                _ = &mut shutdown => break,
            };
            match next {
                Ok(Some(snapshot)) => {
                    let payload = DashboardPayload::new(&snapshot, &state.map, state.plc_connected());
                    yield Event::json(&payload).event("data_update");
                }
                Ok(None) => {
                    log::info!("Snapshot stream closed");
                    break;
                }
                Err(_) => {
                    yield Event::data(r#"{"type":"heartbeat"}"#);
                }
            }
        }
    }
}
