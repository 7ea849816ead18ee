// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JSON endpoints mounted under `/api`

use chrono::{DateTime, Duration, Utc};
use rocket::http::{ContentType, Header};
use rocket::response::status::NotFound;
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::{catch, get, Request, State};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Cursor;

use super::payload::{DashboardPayload, PumpDetail, PumpPayload, ReportPayload};
use super::DashboardState;
use crate::acquisition::samples::to_csv;
use crate::acquisition::{PumpSample, PumpStats, StatusEvent, TripEvent};
use crate::plc::ConnectionState;

/// Look-back window of the event and history endpoints when `hours` is omitted
pub const DEFAULT_HISTORY_HOURS: u32 = 24;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type ApiError = NotFound<Json<ErrorBody>>;

fn invalid_pump() -> ApiError {
    NotFound(Json(ErrorBody {
        error: "Invalid pump ID".to_string(),
    }))
}

/// Validate a pump id taken from the request
///
/// Any integer is accepted by the router so that out-of-range values get the
/// JSON error body instead of the generic 404.
fn checked_pump(state: &DashboardState, pump_id: i64) -> Result<u8, ApiError> {
    u8::try_from(pump_id)
        .ok()
        .filter(|id| state.map.is_valid_pump(*id))
        .ok_or_else(invalid_pump)
}

/// All pumps with their display metadata
#[get("/data")]
pub fn get_data(state: &State<DashboardState>) -> Json<DashboardPayload> {
    let snapshot = state.store.current();
    Json(DashboardPayload::new(
        &snapshot,
        &state.map,
        state.plc_connected(),
    ))
}

#[get("/pump/<pump_id>")]
pub fn get_pump(pump_id: i64, state: &State<DashboardState>) -> Result<Json<PumpDetail>, ApiError> {
    let pump_id = checked_pump(state, pump_id)?;
    let snapshot = state.store.current();
    let pump = snapshot.pump(pump_id).ok_or_else(invalid_pump)?;
    Ok(Json(PumpDetail {
        pump_id,
        pump: PumpPayload::new(pump, &state.map),
        simulated: snapshot.simulated,
        timestamp: snapshot.timestamp,
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub plc_connected: bool,
    pub plc_address: String,
    pub connection_state: ConnectionState,
    pub consecutive_failures: u32,
    pub last_success: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub simulated: bool,
    pub generation: u64,
    pub stream_clients: usize,
    pub timestamp: DateTime<Utc>,
}

/// Connection and publication status
#[get("/status")]
pub fn get_status(state: &State<DashboardState>) -> Json<StatusResponse> {
    let status = state.connection_status();
    let snapshot = state.store.current();
    Json(StatusResponse {
        plc_connected: status.is_connected(),
        plc_address: status.endpoint,
        connection_state: status.state,
        consecutive_failures: status.consecutive_failures,
        last_success: status.last_success,
        last_error: status.last_error,
        simulated: snapshot.simulated,
        generation: snapshot.generation,
        stream_clients: state.dispatcher.receiver_count(),
        timestamp: Utc::now(),
    })
}

#[get("/reports")]
pub fn get_reports(state: &State<DashboardState>) -> Json<ReportPayload> {
    Json(ReportPayload::from(state.store.current().as_ref()))
}

#[derive(Debug, Serialize)]
pub struct EventsResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_id: Option<u8>,
    pub hours: u32,
    pub count: usize,
    pub events: Vec<T>,
}

impl<T> EventsResponse<T> {
    fn new(pump_id: Option<u8>, hours: u32, events: Vec<T>) -> Self {
        Self {
            pump_id,
            hours,
            count: events.len(),
            events,
        }
    }
}

fn history_window(
    state: &DashboardState,
    hours: Option<u32>,
    pump: Option<i64>,
) -> Result<(Option<u8>, u32, DateTime<Utc>), ApiError> {
    let pump_id = pump.map(|id| checked_pump(state, id)).transpose()?;
    let (hours, since) = look_back(hours);
    Ok((pump_id, hours, since))
}

fn look_back(hours: Option<u32>) -> (u32, DateTime<Utc>) {
    let hours = hours.unwrap_or(DEFAULT_HISTORY_HOURS);
    (hours, Utc::now() - Duration::hours(i64::from(hours)))
}

/// Trip transitions, newest first
#[get("/events/trip?<hours>&<pump>")]
pub fn get_trip_events(
    hours: Option<u32>,
    pump: Option<i64>,
    state: &State<DashboardState>,
) -> Result<Json<EventsResponse<TripEvent>>, ApiError> {
    let (pump_id, hours, since) = history_window(state, hours, pump)?;
    let events = state.history.trip_events(pump_id, since);
    Ok(Json(EventsResponse::new(pump_id, hours, events)))
}

/// Running and ready transitions, newest first
#[get("/events/status?<hours>&<pump>")]
pub fn get_status_events(
    hours: Option<u32>,
    pump: Option<i64>,
    state: &State<DashboardState>,
) -> Result<Json<EventsResponse<StatusEvent>>, ApiError> {
    let (pump_id, hours, since) = history_window(state, hours, pump)?;
    let events = state.history.status_events(pump_id, since);
    Ok(Json(EventsResponse::new(pump_id, hours, events)))
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pump_id: Option<u8>,
    pub hours: u32,
    pub data: Vec<PumpSample>,
    pub count: usize,
}

impl HistoryResponse {
    fn new(pump_id: Option<u8>, hours: u32, data: Vec<PumpSample>) -> Self {
        Self {
            pump_id,
            hours,
            count: data.len(),
            data,
        }
    }
}

/// Samples of every pump, newest first
#[get("/historical?<hours>")]
pub fn get_historical(hours: Option<u32>, state: &State<DashboardState>) -> Json<HistoryResponse> {
    let (hours, since) = look_back(hours);
    Json(HistoryResponse::new(None, hours, state.samples.samples(None, since)))
}

/// Samples of one pump, newest first
#[get("/historical/<pump_id>?<hours>")]
pub fn get_pump_historical(
    pump_id: i64,
    hours: Option<u32>,
    state: &State<DashboardState>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let (pump_id, hours, since) = history_window(state, hours, Some(pump_id))?;
    let data = state.samples.samples(pump_id, since);
    Ok(Json(HistoryResponse::new(pump_id, hours, data)))
}

#[derive(Debug, Serialize)]
pub struct PumpStatsResponse {
    pub pump_id: u8,
    pub hours: u32,
    pub stats: PumpStats,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub hours: u32,
    /// Keyed `pump_1` to `pump_7`
    pub stats: BTreeMap<String, PumpStats>,
}

/// Statistics of every pump over the window
#[get("/stats?<hours>")]
pub fn get_stats(hours: Option<u32>, state: &State<DashboardState>) -> Json<StatsResponse> {
    let (hours, since) = look_back(hours);
    let stats = state
        .map
        .pump_ids()
        .map(|id| (format!("pump_{}", id), state.samples.stats(Some(id), since)))
        .collect();
    Json(StatsResponse { hours, stats })
}

#[get("/stats/<pump_id>?<hours>")]
pub fn get_pump_stats(
    pump_id: i64,
    hours: Option<u32>,
    state: &State<DashboardState>,
) -> Result<Json<PumpStatsResponse>, ApiError> {
    let pump_id = checked_pump(state, pump_id)?;
    let (hours, since) = look_back(hours);
    Ok(Json(PumpStatsResponse {
        pump_id,
        hours,
        stats: state.samples.stats(Some(pump_id), since),
    }))
}

/// CSV file served as a download
pub struct CsvExport(String);

impl<'r> Responder<'r, 'static> for CsvExport {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        Response::build()
            .header(ContentType::CSV)
            .header(Header::new(
                "Content-Disposition",
                "attachment; filename=\"pump_data.csv\"",
            ))
            .sized_body(self.0.len(), Cursor::new(self.0))
            .ok()
    }
}

/// Samples of every pump as CSV, newest first
#[get("/export/csv?<hours>")]
pub fn export_csv(hours: Option<u32>, state: &State<DashboardState>) -> Result<CsvExport, ApiError> {
    let (_, since) = look_back(hours);
    let samples = state.samples.samples(None, since);
    if samples.is_empty() {
        return Err(NotFound(Json(ErrorBody {
            error: "No data to export".to_string(),
        })));
    }
    Ok(CsvExport(to_csv(&samples)))
}

#[catch(404)]
pub fn not_found(_request: &Request) -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "Not found".to_string(),
    })
}
