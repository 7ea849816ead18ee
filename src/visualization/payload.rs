// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! JSON documents served to the dashboard
//!
//! The same [`DashboardPayload`] is returned by `GET /api/data` and pushed on
//! the event stream, so the front end renders both the same way.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::acquisition::{PumpSnapshot, SystemSnapshot};
use crate::plc::register_map::ParameterInfo;
use crate::plc::{RegisterMap, Signal};

/// Current values of one pump
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpValues {
    pub ready: bool,
    pub running: bool,
    pub trip: bool,
    pub pressure: f32,
    pub speed: f32,
    pub pressure_setpoint: f32,
}

impl From<&PumpSnapshot> for PumpValues {
    fn from(pump: &PumpSnapshot) -> Self {
        Self {
            ready: pump.ready,
            running: pump.running,
            trip: pump.trip,
            pressure: pump.pressure,
            speed: pump.speed,
            pressure_setpoint: pump.pressure_setpoint,
        }
    }
}

/// Values plus display metadata of one pump
#[derive(Debug, Clone, Serialize)]
pub struct PumpPayload {
    pub values: PumpValues,
    pub parameters: BTreeMap<&'static str, ParameterInfo>,
}

impl PumpPayload {
    pub fn new(pump: &PumpSnapshot, map: &RegisterMap) -> Self {
        let parameters = map
            .pump_entries(pump.pump_id)
            .filter_map(|entry| match entry.signal {
                Signal::Pump { attribute, .. } => Some((attribute.as_str(), entry.parameter_info()?)),
                Signal::SystemAlarm => None,
            })
            .collect();
        Self {
            values: PumpValues::from(pump),
            parameters,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Setpoint {
    pub value: f32,
    pub unit: &'static str,
}

/// Full dashboard document
#[derive(Debug, Clone, Serialize)]
pub struct DashboardPayload {
    pub system_alarm: bool,
    pub simulated: bool,
    pub plc_connected: bool,
    pub pressure_setpoints: BTreeMap<u8, Setpoint>,
    /// Serialized as `pump_1` ... `pump_7`
    #[serde(flatten)]
    pub pumps: BTreeMap<String, PumpPayload>,
    pub timestamp: DateTime<Utc>,
    pub generation: u64,
}

impl DashboardPayload {
    pub fn new(snapshot: &SystemSnapshot, map: &RegisterMap, plc_connected: bool) -> Self {
        let pressure_setpoints = snapshot
            .pumps
            .iter()
            .map(|pump| {
                (
                    pump.pump_id,
                    Setpoint {
                        value: pump.pressure_setpoint,
                        unit: pump.setpoint_unit,
                    },
                )
            })
            .collect();
        let pumps = snapshot
            .pumps
            .iter()
            .map(|pump| (format!("pump_{}", pump.pump_id), PumpPayload::new(pump, map)))
            .collect();
        Self {
            system_alarm: snapshot.system_alarm,
            simulated: snapshot.simulated,
            plc_connected,
            pressure_setpoints,
            pumps,
            timestamp: snapshot.timestamp,
            generation: snapshot.generation,
        }
    }
}

/// `GET /api/pump/<id>` document
#[derive(Debug, Clone, Serialize)]
pub struct PumpDetail {
    pub pump_id: u8,
    #[serde(flatten)]
    pub pump: PumpPayload,
    pub simulated: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PumpStatusFlags {
    pub ready: bool,
    pub running: bool,
    pub trip: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PumpMetrics {
    pub pressure: f32,
    pub speed: f32,
    pub pressure_setpoint: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PumpReport {
    pub pump_id: u8,
    pub status: PumpStatusFlags,
    pub metrics: PumpMetrics,
}

/// `GET /api/reports` document
#[derive(Debug, Clone, Serialize)]
pub struct ReportPayload {
    pub timestamp: DateTime<Utc>,
    pub simulated: bool,
    pub system_alarm: bool,
    pub pumps: Vec<PumpReport>,
}

impl From<&SystemSnapshot> for ReportPayload {
    fn from(snapshot: &SystemSnapshot) -> Self {
        Self {
            timestamp: snapshot.timestamp,
            simulated: snapshot.simulated,
            system_alarm: snapshot.system_alarm,
            pumps: snapshot
                .pumps
                .iter()
                .map(|pump| PumpReport {
                    pump_id: pump.pump_id,
                    status: PumpStatusFlags {
                        ready: pump.ready,
                        running: pump.running,
                        trip: pump.trip,
                    },
                    metrics: PumpMetrics {
                        pressure: pump.pressure,
                        speed: pump.speed,
                        pressure_setpoint: pump.pressure_setpoint,
                    },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_json_shape() {
        let map = RegisterMap::standard();
        let mut snapshot = SystemSnapshot::empty();
        snapshot.pumps[1].running = true;
        snapshot.pumps[1].pressure_setpoint = 5.8;

        let json = serde_json::to_value(DashboardPayload::new(&snapshot, &map, false)).unwrap();
        assert_eq!(json["plc_connected"], false);
        assert_eq!(json["simulated"], true);
        assert_eq!(json["pump_2"]["values"]["running"], true);
        assert_eq!(json["pump_7"]["parameters"]["trip"]["offset"], 96);
        assert_eq!(json["pump_7"]["parameters"]["trip"]["bit"], 2);
        assert_eq!(json["pump_1"]["parameters"]["pressure"]["unit"], "bar");
        assert_eq!(json["pressure_setpoints"]["2"]["unit"], "bar");
        assert!(json.get("pump_8").is_none());
    }

    #[test]
    fn test_report_lists_every_pump() {
        let report = ReportPayload::from(&SystemSnapshot::empty());
        let ids: Vec<u8> = report.pumps.iter().map(|p| p.pump_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
    }
}
