// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Raw data block to [`SystemSnapshot`] conversion
//!
//! REAL values are IEEE-754 single precision in big-endian order, which is
//! the native S7 layout. The Modbus transport hands over registers high byte
//! first so both transports produce the same byte image.

use chrono::Utc;

use super::error::PlcError;
use super::register_map::{Attribute, RegisterEntry, RegisterMap, PRESSURE_UNIT};
use crate::acquisition::snapshot::{PumpSnapshot, SystemSnapshot};

/// Decode a raw block using `map`
///
/// The length check happens before any read, so a short block always yields
/// [`PlcError::ShortBuffer`] and never a partial snapshot.
pub fn decode(raw: &[u8], map: &RegisterMap) -> Result<SystemSnapshot, PlcError> {
    let needed = map.required_len();
    if raw.len() < needed {
        return Err(PlcError::ShortBuffer {
            needed,
            actual: raw.len(),
        });
    }

    let mut pumps = Vec::new();
    for pump_id in map.pump_ids() {
        let bit = |attribute| read_bool(raw, map.lookup(pump_id, attribute)?);
        let real = |attribute| read_f32(raw, map.lookup(pump_id, attribute)?);

        pumps.push(PumpSnapshot {
            pump_id,
            ready: bit(Attribute::Ready)?,
            running: bit(Attribute::Running)?,
            trip: bit(Attribute::Trip)?,
            pressure: real(Attribute::Pressure)?,
            speed: real(Attribute::Speed)?,
            pressure_setpoint: real(Attribute::PressureSetpoint)?,
            setpoint_unit: PRESSURE_UNIT,
        });
    }

    Ok(SystemSnapshot {
        pumps,
        system_alarm: read_bool(raw, map.alarm())?,
        timestamp: Utc::now(),
        simulated: false,
        generation: 0,
    })
}

fn read_bool(raw: &[u8], entry: &RegisterEntry) -> Result<bool, PlcError> {
    let bit = entry
        .bit
        .filter(|b| *b < 8)
        .ok_or_else(|| PlcError::InvalidMap(format!("{:?} has no usable bit", entry.signal)))?;
    let byte = raw.get(entry.offset).ok_or(PlcError::ShortBuffer {
        needed: entry.end(),
        actual: raw.len(),
    })?;
    Ok(byte & (1 << bit) != 0)
}

fn read_f32(raw: &[u8], entry: &RegisterEntry) -> Result<f32, PlcError> {
    let bytes: [u8; 4] = raw
        .get(entry.offset..entry.offset + 4)
        .and_then(|slice| slice.try_into().ok())
        .ok_or(PlcError::ShortBuffer {
            needed: entry.end(),
            actual: raw.len(),
        })?;
    Ok(f32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn block() -> Vec<u8> {
        vec![0u8; RegisterMap::standard().required_len()]
    }

    #[test]
    fn test_status_bits() {
        let map = RegisterMap::standard();
        let mut raw = block();
        raw[0] = 0x05;

        let snapshot = decode(&raw, &map).unwrap();
        let pump = snapshot.pump(1).unwrap();
        assert!(pump.ready);
        assert!(!pump.running);
        assert!(pump.trip);
        assert!(!snapshot.simulated);
        assert!(!snapshot.pump(2).unwrap().ready);
    }

    #[test]
    fn test_all_status_bits_may_be_set() {
        let map = RegisterMap::standard();
        let mut raw = block();
        raw[48] = 0x07;

        let pump = decode(&raw, &map).unwrap().pump(4).cloned().unwrap();
        assert!(pump.ready && pump.running && pump.trip);
        assert!(!pump.is_regulating());
    }

    #[test]
    fn test_real_values_are_big_endian() {
        let map = RegisterMap::standard();
        let mut raw = block();
        raw[4..8].copy_from_slice(&5.42f32.to_be_bytes());
        raw[24..28].copy_from_slice(&37.5f32.to_be_bytes());
        raw[108..112].copy_from_slice(&7.3f32.to_be_bytes());

        let snapshot = decode(&raw, &map).unwrap();
        assert_abs_diff_eq!(snapshot.pump(1).unwrap().pressure, 5.42, epsilon = 1e-5);
        assert_abs_diff_eq!(snapshot.pump(2).unwrap().speed, 37.5, epsilon = 1e-5);
        let pump7 = snapshot.pump(7).unwrap();
        assert_abs_diff_eq!(pump7.pressure_setpoint, 7.3, epsilon = 1e-5);
        assert_eq!(pump7.setpoint_unit, "bar");
    }

    #[test]
    fn test_system_alarm() {
        let map = RegisterMap::standard();
        let mut raw = block();
        assert!(!decode(&raw, &map).unwrap().system_alarm);
        raw[112] = 0x01;
        assert!(decode(&raw, &map).unwrap().system_alarm);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let map = RegisterMap::standard();
        let raw: Vec<u8> = (0..map.required_len()).map(|i| (i * 37 % 251) as u8).collect();

        let first = decode(&raw, &map).unwrap();
        let second = decode(&raw, &map).unwrap();
        // Compare bit patterns, some of these floats are NaN
        for (a, b) in first.pumps.iter().zip(second.pumps.iter()) {
            assert_eq!(a.ready, b.ready);
            assert_eq!(a.running, b.running);
            assert_eq!(a.trip, b.trip);
            assert_eq!(a.pressure.to_bits(), b.pressure.to_bits());
            assert_eq!(a.speed.to_bits(), b.speed.to_bits());
            assert_eq!(a.pressure_setpoint.to_bits(), b.pressure_setpoint.to_bits());
        }
        assert_eq!(first.system_alarm, second.system_alarm);
    }

    #[test]
    fn test_every_short_length_fails() {
        let map = RegisterMap::standard();
        let needed = map.required_len();
        for len in 0..needed {
            match decode(&vec![0xFF; len], &map) {
                Err(PlcError::ShortBuffer {
                    needed: n,
                    actual,
                }) => {
                    assert_eq!(n, needed);
                    assert_eq!(actual, len);
                }
                other => panic!("length {} decoded to {:?}", len, other),
            }
        }
    }

    #[test]
    fn test_longer_block_is_accepted() {
        let map = RegisterMap::standard();
        let raw = vec![0u8; map.required_len() + 64];
        assert_eq!(decode(&raw, &map).unwrap().pumps.len(), 7);
    }
}
