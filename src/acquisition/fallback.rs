// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated pump data for periods without a PLC connection

use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::snapshot::{PumpSnapshot, SystemSnapshot};
use crate::plc::register_map::{PRESSURE_UNIT, PUMP_COUNT};

/// Generator of plausible snapshots flagged as simulated
///
/// Pumps are never tripped and the system alarm is always off, so simulated
/// data cannot raise a false alarm on the dashboard.
pub struct FallbackGenerator {
    rng: StdRng,
}

impl Default for FallbackGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FallbackGenerator {
    /// Generator seeded from the operating system
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible generator
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn generate(&mut self) -> SystemSnapshot {
        let pumps = (1..=PUMP_COUNT).map(|id| self.pump(id)).collect();
        SystemSnapshot {
            pumps,
            system_alarm: false,
            timestamp: Utc::now(),
            simulated: true,
            generation: 0,
        }
    }

    fn pump(&mut self, pump_id: u8) -> PumpSnapshot {
        let ready = self.rng.random_bool(0.7);
        let running = ready && self.rng.random_bool(0.5);

        let (pressure, speed) = if running {
            (
                5.0 + self.rng.random_range(-1.0..2.0),
                30.0 + self.rng.random_range(-5.0..10.0),
            )
        } else {
            (
                self.rng.random_range(0.0..2.0),
                self.rng.random_range(0.0..5.0),
            )
        };

        PumpSnapshot {
            pump_id,
            ready,
            running,
            trip: false,
            pressure: round2(pressure),
            speed: round2(speed),
            pressure_setpoint: round2(5.5 + 0.3 * (pump_id - 1) as f32),
            setpoint_unit: PRESSURE_UNIT,
        }
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_snapshot_is_benign() {
        let mut generator = FallbackGenerator::with_seed(7);
        for _ in 0..50 {
            let snapshot = generator.generate();
            assert!(snapshot.simulated);
            assert!(!snapshot.system_alarm);
            assert_eq!(snapshot.pumps.len(), 7);
            for pump in &snapshot.pumps {
                assert!(!pump.trip);
                assert!(!pump.running || pump.ready);
                assert!((0.0..=10.0).contains(&pump.pressure));
                assert!((0.0..=50.0).contains(&pump.speed));
                if pump.running {
                    assert!(pump.pressure >= 4.0 && pump.speed >= 25.0);
                }
            }
        }
    }

    #[test]
    fn test_setpoints_follow_pump_index() {
        let snapshot = FallbackGenerator::with_seed(1).generate();
        assert_eq!(snapshot.pump(1).unwrap().pressure_setpoint, 5.5);
        assert_eq!(snapshot.pump(7).unwrap().pressure_setpoint, 7.3);
    }

    #[test]
    fn test_seeded_generators_agree() {
        let mut a = FallbackGenerator::with_seed(42);
        let mut b = FallbackGenerator::with_seed(42);
        for _ in 0..5 {
            assert_eq!(a.generate().pumps, b.generate().pumps);
        }
    }
}
