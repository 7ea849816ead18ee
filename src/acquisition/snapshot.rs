// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Immutable views of the pump station at one point in time

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::plc::register_map::{PRESSURE_UNIT, PUMP_COUNT};

/// Decoded state of one pump
///
/// `ready`, `running` and `trip` are independent bits of the PLC program and
/// are reported as read, even when the combination looks contradictory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpSnapshot {
    pub pump_id: u8,
    pub ready: bool,
    pub running: bool,
    pub trip: bool,
    /// Discharge pressure in bar
    pub pressure: f32,
    /// Drive frequency in Hz
    pub speed: f32,
    /// Pressure setpoint in `setpoint_unit`
    pub pressure_setpoint: f32,
    pub setpoint_unit: &'static str,
}

impl PumpSnapshot {
    /// All-clear record for `pump_id`
    pub fn idle(pump_id: u8) -> Self {
        Self {
            pump_id,
            ready: false,
            running: false,
            trip: false,
            pressure: 0.0,
            speed: 0.0,
            pressure_setpoint: 0.0,
            setpoint_unit: PRESSURE_UNIT,
        }
    }

    /// A tripped pump is never considered to be regulating pressure
    pub fn is_regulating(&self) -> bool {
        self.running && !self.trip
    }
}

/// Aggregate of every pump plus the system alarm
///
/// Instances are only ever replaced as a whole by the snapshot store, never
/// modified after publication.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemSnapshot {
    pub pumps: Vec<PumpSnapshot>,
    pub system_alarm: bool,
    pub timestamp: DateTime<Utc>,
    /// Values come from the fallback generator, not from the PLC
    pub simulated: bool,
    /// Publication counter, assigned by the snapshot store
    pub generation: u64,
}

impl SystemSnapshot {
    /// Snapshot with every pump idle, used before anything has been published
    pub fn empty() -> Self {
        Self {
            pumps: (1..=PUMP_COUNT).map(PumpSnapshot::idle).collect(),
            system_alarm: false,
            timestamp: Utc::now(),
            simulated: true,
            generation: 0,
        }
    }

    pub fn pump(&self, pump_id: u8) -> Option<&PumpSnapshot> {
        self.pumps.iter().find(|p| p.pump_id == pump_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_snapshot() {
        let snapshot = SystemSnapshot::empty();
        assert_eq!(snapshot.pumps.len(), 7);
        assert!(snapshot.simulated);
        assert!(!snapshot.system_alarm);
        assert!(snapshot.pump(7).is_some());
        assert!(snapshot.pump(8).is_none());
    }

    #[test]
    fn test_tripped_pump_is_not_regulating() {
        let mut pump = PumpSnapshot::idle(1);
        pump.running = true;
        assert!(pump.is_regulating());
        pump.trip = true;
        assert!(!pump.is_regulating());
    }
}
