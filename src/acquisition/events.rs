// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Pump state transitions
//!
//! Every live snapshot is compared with the previous one, pump by pump. A
//! change of the trip bit yields a [`TripEvent`], a change of the running or
//! ready bit yields a [`StatusEvent`]. The events are kept in a bounded
//! in-memory history served by the dashboard API.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};

use super::dispatcher::SnapshotSubscriber;
use super::snapshot::{PumpSnapshot, SystemSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripEvent {
    pub timestamp: DateTime<Utc>,
    pub pump_id: u8,
    /// `TRIP ON` or `TRIP OFF`
    pub trip_state: &'static str,
    pub pressure: f32,
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusEvent {
    pub timestamp: DateTime<Utc>,
    pub pump_id: u8,
    pub status: &'static str,
    pub description: &'static str,
    pub pressure: f32,
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PumpEvent {
    Trip(TripEvent),
    Status(StatusEvent),
}

impl PumpEvent {
    pub fn pump_id(&self) -> u8 {
        match self {
            PumpEvent::Trip(e) => e.pump_id,
            PumpEvent::Status(e) => e.pump_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            PumpEvent::Trip(e) => e.timestamp,
            PumpEvent::Status(e) => e.timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PumpBits {
    ready: bool,
    running: bool,
    trip: bool,
}

/// Edge detector over successive snapshots
///
/// Pumps not seen yet are assumed idle, so a pump already running in the
/// first snapshot produces a start event.
#[derive(Debug, Default)]
pub struct TransitionTracker {
    previous: BTreeMap<u8, PumpBits>,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events between the previous snapshot and `snapshot`, in pump order
    pub fn observe(&mut self, snapshot: &SystemSnapshot) -> Vec<PumpEvent> {
        let mut events = Vec::new();
        for pump in &snapshot.pumps {
            let previous = self.previous.entry(pump.pump_id).or_default();
            let at = snapshot.timestamp;

            if pump.trip != previous.trip {
                events.push(PumpEvent::Trip(TripEvent {
                    timestamp: at,
                    pump_id: pump.pump_id,
                    trip_state: if pump.trip { "TRIP ON" } else { "TRIP OFF" },
                    pressure: pump.pressure,
                    speed: pump.speed,
                }));
            }
            if pump.running != previous.running {
                let (status, description) = if pump.running {
                    ("Running", "Pump started")
                } else {
                    ("Stopped", "Pump stopped")
                };
                events.push(status_event(at, pump, status, description));
            }
            if pump.ready != previous.ready {
                let (status, description) = if pump.ready {
                    ("Ready", "Pump ready for operation")
                } else {
                    ("Not Ready", "Pump not ready")
                };
                events.push(status_event(at, pump, status, description));
            }

            *previous = PumpBits {
                ready: pump.ready,
                running: pump.running,
                trip: pump.trip,
            };
        }
        events
    }
}

fn status_event(
    timestamp: DateTime<Utc>,
    pump: &PumpSnapshot,
    status: &'static str,
    description: &'static str,
) -> PumpEvent {
    PumpEvent::Status(StatusEvent {
        timestamp,
        pump_id: pump.pump_id,
        status,
        description,
        pressure: pump.pressure,
        speed: pump.speed,
    })
}

/// Bounded event history, oldest entries dropped first
pub struct EventHistory {
    capacity: usize,
    events: RwLock<VecDeque<PumpEvent>>,
}

impl EventHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            events: RwLock::new(VecDeque::new()),
        }
    }

    pub fn extend(&self, new_events: impl IntoIterator<Item = PumpEvent>) {
        let mut events = match self.events.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for event in new_events {
            if events.len() == self.capacity {
                events.pop_front();
            }
            events.push_back(event);
        }
    }

    pub fn len(&self) -> usize {
        match self.events.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Trip events newer than `since`, newest first, optionally for one pump
    pub fn trip_events(&self, pump_id: Option<u8>, since: DateTime<Utc>) -> Vec<TripEvent> {
        self.select(pump_id, since, |event| match event {
            PumpEvent::Trip(e) => Some(e.clone()),
            PumpEvent::Status(_) => None,
        })
    }

    /// Status events newer than `since`, newest first, optionally for one pump
    pub fn status_events(&self, pump_id: Option<u8>, since: DateTime<Utc>) -> Vec<StatusEvent> {
        self.select(pump_id, since, |event| match event {
            PumpEvent::Status(e) => Some(e.clone()),
            PumpEvent::Trip(_) => None,
        })
    }

    fn select<T>(
        &self,
        pump_id: Option<u8>,
        since: DateTime<Utc>,
        pick: impl Fn(&PumpEvent) -> Option<T>,
    ) -> Vec<T> {
        let events = match self.events.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        events
            .iter()
            .rev()
            .filter(|e| e.timestamp() >= since)
            .filter(|e| pump_id.is_none_or(|id| e.pump_id() == id))
            .filter_map(pick)
            .collect()
    }
}

/// Subscriber feeding the [`EventHistory`] from live snapshots
pub struct EventRecorder {
    tracker: Mutex<TransitionTracker>,
    history: Arc<EventHistory>,
}

impl EventRecorder {
    pub fn new(history: Arc<EventHistory>) -> Self {
        Self {
            tracker: Mutex::new(TransitionTracker::new()),
            history,
        }
    }
}

impl SnapshotSubscriber for EventRecorder {
    fn name(&self) -> &str {
        "event-recorder"
    }

    fn deliver(&self, snapshot: &Arc<SystemSnapshot>) -> anyhow::Result<()> {
        // Simulated values never describe the real plant
        if snapshot.simulated {
            return Ok(());
        }
        let events = {
            let mut tracker = self
                .tracker
                .lock()
                .map_err(|_| anyhow::anyhow!("transition tracker lock poisoned"))?;
            tracker.observe(snapshot)
        };
        if !events.is_empty() {
            log::debug!(
                "{} pump event(s) in snapshot {}",
                events.len(),
                snapshot.generation
            );
        }
        self.history.extend(events);
        Ok(())
    }
}
