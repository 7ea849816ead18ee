// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-pump sample history
//!
//! Every live snapshot adds one [`PumpSample`] per pump to a bounded
//! in-memory history. The dashboard API serves it as raw samples, as
//! aggregated [`PumpStats`] and as a CSV export.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::Write;
use std::sync::{Arc, RwLock};

use super::dispatcher::SnapshotSubscriber;
use super::snapshot::{PumpSnapshot, SystemSnapshot};

/// Most samples returned for one pump
pub const PUMP_SAMPLE_LIMIT: usize = 1000;

/// Most samples returned across all pumps
pub const ALL_SAMPLE_LIMIT: usize = 5000;

pub const CSV_HEADER: &str = "timestamp,pump_id,pressure,speed,pressure_setpoint,ready,running,trip";

/// Values of one pump at one publication
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PumpSample {
    pub timestamp: DateTime<Utc>,
    pub pump_id: u8,
    pub pressure: f32,
    pub speed: f32,
    pub pressure_setpoint: f32,
    pub ready: bool,
    pub running: bool,
    pub trip: bool,
}

impl PumpSample {
    fn new(timestamp: DateTime<Utc>, pump: &PumpSnapshot) -> Self {
        Self {
            timestamp,
            pump_id: pump.pump_id,
            pressure: pump.pressure,
            speed: pump.speed,
            pressure_setpoint: pump.pressure_setpoint,
            ready: pump.ready,
            running: pump.running,
            trip: pump.trip,
        }
    }
}

/// Aggregates over a window of samples, all zero when the window is empty
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PumpStats {
    pub avg_pressure: f64,
    pub max_pressure: f64,
    pub min_pressure: f64,
    pub avg_speed: f64,
    pub max_speed: f64,
    pub record_count: usize,
    /// Samples taken while the trip bit was set
    pub trip_count: usize,
}

impl PumpStats {
    fn from_samples<'a>(samples: impl Iterator<Item = &'a PumpSample>) -> Self {
        let mut stats = PumpStats::default();
        let mut pressure_sum = 0.0;
        let mut speed_sum = 0.0;
        let mut min_pressure = f64::INFINITY;
        let mut max_pressure = f64::NEG_INFINITY;
        let mut max_speed = f64::NEG_INFINITY;

        for sample in samples {
            let pressure = f64::from(sample.pressure);
            let speed = f64::from(sample.speed);
            stats.record_count += 1;
            if sample.trip {
                stats.trip_count += 1;
            }
            pressure_sum += pressure;
            speed_sum += speed;
            min_pressure = min_pressure.min(pressure);
            max_pressure = max_pressure.max(pressure);
            max_speed = max_speed.max(speed);
        }

        if stats.record_count > 0 {
            let count = stats.record_count as f64;
            stats.avg_pressure = round2(pressure_sum / count);
            stats.max_pressure = round2(max_pressure);
            stats.min_pressure = round2(min_pressure);
            stats.avg_speed = round2(speed_sum / count);
            stats.max_speed = round2(max_speed);
        }
        stats
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Bounded sample history, oldest samples dropped first
pub struct SampleHistory {
    capacity: usize,
    samples: RwLock<VecDeque<PumpSample>>,
}

impl SampleHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            samples: RwLock::new(VecDeque::new()),
        }
    }

    /// Append one sample per pump of `snapshot`
    pub fn record(&self, snapshot: &SystemSnapshot) {
        let mut samples = match self.samples.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        for pump in &snapshot.pumps {
            if samples.len() == self.capacity {
                samples.pop_front();
            }
            samples.push_back(PumpSample::new(snapshot.timestamp, pump));
        }
    }

    pub fn len(&self) -> usize {
        match self.samples.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples newer than `since`, newest first
    ///
    /// At most [`PUMP_SAMPLE_LIMIT`] samples for one pump, or
    /// [`ALL_SAMPLE_LIMIT`] when `pump_id` is `None`.
    pub fn samples(&self, pump_id: Option<u8>, since: DateTime<Utc>) -> Vec<PumpSample> {
        let limit = match pump_id {
            Some(_) => PUMP_SAMPLE_LIMIT,
            None => ALL_SAMPLE_LIMIT,
        };
        let samples = match self.samples.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        samples
            .iter()
            .rev()
            .filter(|s| s.timestamp >= since)
            .filter(|s| pump_id.is_none_or(|id| s.pump_id == id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Aggregates over every sample newer than `since`
    pub fn stats(&self, pump_id: Option<u8>, since: DateTime<Utc>) -> PumpStats {
        let samples = match self.samples.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        PumpStats::from_samples(
            samples
                .iter()
                .filter(|s| s.timestamp >= since)
                .filter(|s| pump_id.is_none_or(|id| s.pump_id == id)),
        )
    }
}

/// Render samples as CSV, header first, in the given order
pub fn to_csv(samples: &[PumpSample]) -> String {
    let mut csv = String::with_capacity(64 * (samples.len() + 1));
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for s in samples {
        // writing to a String cannot fail
        let _ = writeln!(
            csv,
            "{},{},{},{},{},{},{},{}",
            s.timestamp.to_rfc3339(),
            s.pump_id,
            s.pressure,
            s.speed,
            s.pressure_setpoint,
            s.ready,
            s.running,
            s.trip
        );
    }
    csv
}

/// Subscriber feeding the [`SampleHistory`] from live snapshots
pub struct SampleRecorder {
    history: Arc<SampleHistory>,
}

impl SampleRecorder {
    pub fn new(history: Arc<SampleHistory>) -> Self {
        Self { history }
    }
}

impl SnapshotSubscriber for SampleRecorder {
    fn name(&self) -> &str {
        "sample-recorder"
    }

    fn deliver(&self, snapshot: &Arc<SystemSnapshot>) -> anyhow::Result<()> {
        if !snapshot.simulated {
            self.history.record(snapshot);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn live_at(timestamp: DateTime<Utc>, pressure: f32, trip: bool) -> Arc<SystemSnapshot> {
        let mut snapshot = SystemSnapshot::empty();
        snapshot.simulated = false;
        snapshot.timestamp = timestamp;
        for pump in snapshot.pumps.iter_mut() {
            pump.pressure = pressure;
            pump.speed = 2.0 * pressure;
            pump.trip = trip && pump.pump_id == 2;
        }
        Arc::new(snapshot)
    }

    #[test]
    fn test_samples_newest_first_per_pump() {
        let history = SampleHistory::new(100);
        let now = Utc::now();
        history.record(&live_at(now - Duration::minutes(2), 5.0, false));
        history.record(&live_at(now - Duration::minutes(1), 6.0, false));
        assert_eq!(history.len(), 14);

        let pump_4 = history.samples(Some(4), now - Duration::hours(1));
        assert_eq!(pump_4.len(), 2);
        assert!(pump_4.iter().all(|s| s.pump_id == 4));
        assert_eq!(pump_4[0].pressure, 6.0);
        assert_eq!(pump_4[1].pressure, 5.0);

        // Only the newest publication is inside a 90 s window
        let recent = history.samples(None, now - Duration::seconds(90));
        assert_eq!(recent.len(), 7);
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let history = SampleHistory::new(10);
        let now = Utc::now();
        history.record(&live_at(now - Duration::minutes(1), 5.0, false));
        history.record(&live_at(now, 6.0, false));
        assert_eq!(history.len(), 10);
        let pump_1 = history.samples(Some(1), now - Duration::hours(1));
        assert_eq!(pump_1.len(), 1);
        assert_eq!(pump_1[0].pressure, 6.0);
    }

    #[test]
    fn test_stats() {
        let history = SampleHistory::new(100);
        let now = Utc::now();
        history.record(&live_at(now - Duration::minutes(3), 4.5, false));
        history.record(&live_at(now - Duration::minutes(2), 5.25, true));
        history.record(&live_at(now - Duration::minutes(1), 6.0, true));

        let stats = history.stats(Some(2), now - Duration::hours(1));
        assert_eq!(stats.record_count, 3);
        assert_eq!(stats.trip_count, 2);
        assert_eq!(stats.avg_pressure, 5.25);
        assert_eq!(stats.max_pressure, 6.0);
        assert_eq!(stats.min_pressure, 4.5);
        assert_eq!(stats.avg_speed, 10.5);
        assert_eq!(stats.max_speed, 12.0);

        assert_eq!(history.stats(Some(3), now - Duration::hours(1)).trip_count, 0);
        assert_eq!(history.stats(None, now - Duration::hours(1)).record_count, 21);
        assert_eq!(history.stats(Some(1), now), PumpStats::default());
    }

    #[test]
    fn test_csv_rows() {
        let history = SampleHistory::new(100);
        let now = Utc::now();
        history.record(&live_at(now, 5.42, true));

        let csv = to_csv(&history.samples(Some(2), now - Duration::hours(1)));
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        assert_eq!(
            lines.next(),
            Some(format!("{},2,5.42,10.84,0,false,false,true", now.to_rfc3339()).as_str())
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_recorder_ignores_simulated_snapshots() {
        let history = Arc::new(SampleHistory::new(100));
        let recorder = SampleRecorder::new(history.clone());

        let mut simulated = SystemSnapshot::empty();
        simulated.simulated = true;
        recorder.deliver(&Arc::new(simulated)).unwrap();
        assert!(history.is_empty());

        recorder.deliver(&live_at(Utc::now(), 5.0, false)).unwrap();
        assert_eq!(history.len(), 7);
    }
}
