// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-pump-scada project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register map of the pump data block
//!
//! The PLC exposes one data block laid out as seven 16-byte pump records
//! followed by the system alarm byte:
//!
//! | Offset in record | Content                                  |
//! |------------------|------------------------------------------|
//! | 0                | status byte: bit 0 ready, 1 running, 2 trip |
//! | 4                | pressure, REAL (bar)                     |
//! | 8                | speed, REAL (Hz)                         |
//! | 12               | pressure setpoint, REAL (bar)            |
//!
//! Pump `n` starts at byte `16 * (n - 1)`; the system alarm is bit 0 of byte 112.
//! The layout belongs to the PLC program and is not versioned, so it is kept
//! as a fixed table here and checked once at startup with [`RegisterMap::validate`].

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use super::decoder;
use super::error::PlcError;

/// Number of pumps described by the block
pub const PUMP_COUNT: u8 = 7;

/// Size of one pump record in bytes
pub const PUMP_STRIDE: usize = 16;

/// Byte holding the system alarm bit
pub const SYSTEM_ALARM_OFFSET: usize = 112;

/// Unit of pressure values and setpoints
pub const PRESSURE_UNIT: &str = "bar";

/// Unit of pump speed values
pub const SPEED_UNIT: &str = "Hz";

/// Pump attributes present in every pump record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Ready,
    Running,
    Trip,
    Pressure,
    Speed,
    PressureSetpoint,
}

impl Attribute {
    pub const ALL: [Attribute; 6] = [
        Attribute::Ready,
        Attribute::Running,
        Attribute::Trip,
        Attribute::Pressure,
        Attribute::Speed,
        Attribute::PressureSetpoint,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Attribute::Ready => "ready",
            Attribute::Running => "running",
            Attribute::Trip => "trip",
            Attribute::Pressure => "pressure",
            Attribute::Speed => "speed",
            Attribute::PressureSetpoint => "pressure_setpoint",
        }
    }

    /// Parse an attribute name as used in the JSON payloads
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Attribute::Ready | Attribute::Running | Attribute::Trip => ValueKind::Bool,
            Attribute::Pressure | Attribute::Speed | Attribute::PressureSetpoint => {
                ValueKind::Float32
            }
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Attribute::Ready => "READY",
            Attribute::Running => "RUNNING",
            Attribute::Trip => "TRIP",
            Attribute::Pressure => "PRESSURE",
            Attribute::Speed => "SPEED",
            Attribute::PressureSetpoint => "PRESSURE SETPOINT",
        }
    }

    /// Unit and display range of analog attributes
    fn range(&self) -> Option<(&'static str, f32, f32)> {
        match self {
            Attribute::Pressure | Attribute::PressureSetpoint => Some((PRESSURE_UNIT, 0.0, 10.0)),
            Attribute::Speed => Some((SPEED_UNIT, 0.0, 50.0)),
            _ => None,
        }
    }

    fn color(&self) -> Option<&'static str> {
        match self {
            Attribute::Ready => Some("yellow"),
            Attribute::Running => Some("green"),
            Attribute::Trip => Some("red"),
            _ => None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage type of a signal in the data block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ValueKind {
    #[serde(rename = "bool")]
    Bool,
    /// IEEE-754 single precision, big-endian (S7 `REAL`)
    #[serde(rename = "real")]
    Float32,
}

impl ValueKind {
    /// Number of bytes read for this kind
    pub fn width(&self) -> usize {
        match self {
            ValueKind::Bool => 1,
            ValueKind::Float32 => 4,
        }
    }
}

/// What a register entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    Pump { pump_id: u8, attribute: Attribute },
    SystemAlarm,
}

/// One addressed value in the data block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterEntry {
    pub signal: Signal,
    pub offset: usize,
    /// Bit index inside the byte, only for `Bool` entries
    pub bit: Option<u8>,
    pub kind: ValueKind,
}

/// Presentation metadata for a pump parameter, served alongside its value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterInfo {
    pub offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bit: Option<u8>,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<&'static str>,
}

impl RegisterEntry {
    /// First byte past this entry
    pub fn end(&self) -> usize {
        self.offset + self.kind.width()
    }

    /// Display metadata, `None` for the system alarm
    pub fn parameter_info(&self) -> Option<ParameterInfo> {
        let Signal::Pump { pump_id, attribute } = self.signal else {
            return None;
        };
        let range = attribute.range();
        Some(ParameterInfo {
            offset: self.offset,
            bit: self.bit,
            kind: self.kind,
            label: format!("PUMP {} {}", pump_id, attribute.label()),
            unit: range.map(|(unit, _, _)| unit),
            min: range.map(|(_, min, _)| min),
            max: range.map(|(_, _, max)| max),
            color: attribute.color(),
        })
    }
}

/// Position of an attribute inside a pump record
struct AttributeLayout {
    attribute: Attribute,
    offset: usize,
    bit: Option<u8>,
}

const PUMP_LAYOUT: [AttributeLayout; 6] = [
    AttributeLayout {
        attribute: Attribute::Ready,
        offset: 0,
        bit: Some(0),
    },
    AttributeLayout {
        attribute: Attribute::Running,
        offset: 0,
        bit: Some(1),
    },
    AttributeLayout {
        attribute: Attribute::Trip,
        offset: 0,
        bit: Some(2),
    },
    AttributeLayout {
        attribute: Attribute::Pressure,
        offset: 4,
        bit: None,
    },
    AttributeLayout {
        attribute: Attribute::Speed,
        offset: 8,
        bit: None,
    },
    AttributeLayout {
        attribute: Attribute::PressureSetpoint,
        offset: 12,
        bit: None,
    },
];

/// Lookup table from signals to their location in the data block
#[derive(Debug, Clone)]
pub struct RegisterMap {
    entries: Vec<RegisterEntry>,
    alarm: RegisterEntry,
}

impl Default for RegisterMap {
    fn default() -> Self {
        Self::standard()
    }
}

impl RegisterMap {
    /// The pump station layout described in the module documentation
    pub fn standard() -> Self {
        let entries = (1..=PUMP_COUNT)
            .flat_map(|pump_id| {
                let base = (pump_id as usize - 1) * PUMP_STRIDE;
                PUMP_LAYOUT.iter().map(move |layout| RegisterEntry {
                    signal: Signal::Pump {
                        pump_id,
                        attribute: layout.attribute,
                    },
                    offset: base + layout.offset,
                    bit: layout.bit,
                    kind: layout.attribute.kind(),
                })
            })
            .collect();

        Self {
            entries,
            alarm: RegisterEntry {
                signal: Signal::SystemAlarm,
                offset: SYSTEM_ALARM_OFFSET,
                bit: Some(0),
                kind: ValueKind::Bool,
            },
        }
    }

    /// Build a map from explicit entries; call [`validate`](Self::validate) before use
    pub fn from_entries(entries: Vec<RegisterEntry>, alarm: RegisterEntry) -> Self {
        Self { entries, alarm }
    }

    pub fn lookup(&self, pump_id: u8, attribute: Attribute) -> Result<&RegisterEntry, PlcError> {
        self.entries
            .iter()
            .find(|e| {
                e.signal
                    == Signal::Pump {
                        pump_id,
                        attribute,
                    }
            })
            .ok_or_else(|| PlcError::UnknownAttribute {
                pump_id,
                attribute: attribute.to_string(),
            })
    }

    /// Same as [`lookup`](Self::lookup) with the attribute given by name
    pub fn lookup_name(&self, pump_id: u8, name: &str) -> Result<&RegisterEntry, PlcError> {
        match Attribute::from_name(name) {
            Some(attribute) => self.lookup(pump_id, attribute),
            None => Err(PlcError::UnknownAttribute {
                pump_id,
                attribute: name.to_string(),
            }),
        }
    }

    pub fn alarm(&self) -> &RegisterEntry {
        &self.alarm
    }

    pub fn entries(&self) -> &[RegisterEntry] {
        &self.entries
    }

    /// Entries of one pump in layout order
    pub fn pump_entries(&self, pump_id: u8) -> impl Iterator<Item = &RegisterEntry> {
        self.entries.iter().filter(
            move |e| matches!(e.signal, Signal::Pump { pump_id: id, .. } if id == pump_id),
        )
    }

    /// Pump ids served by this map
    pub fn pump_ids(&self) -> RangeInclusive<u8> {
        1..=PUMP_COUNT
    }

    pub fn is_valid_pump(&self, pump_id: u8) -> bool {
        self.pump_ids().contains(&pump_id)
    }

    /// Length of a raw block covering every entry
    pub fn required_len(&self) -> usize {
        self.entries
            .iter()
            .chain(std::iter::once(&self.alarm))
            .map(RegisterEntry::end)
            .max()
            .unwrap_or(0)
    }

    /// Startup check of the table against the expected block
    ///
    /// Fails when a pump misses an attribute, when a bit index is out of range
    /// or on the wrong kind, when two signals share storage, or when the map
    /// does not decode a zero-filled block of [`required_len`](Self::required_len) bytes.
    pub fn validate(&self) -> Result<(), PlcError> {
        let mut seen = BTreeSet::new();
        for entry in &self.entries {
            if !seen.insert(entry.signal_key()) {
                return Err(PlcError::InvalidMap(format!(
                    "duplicate entry for {:?}",
                    entry.signal
                )));
            }
            if let Signal::Pump { pump_id, attribute } = entry.signal {
                if !self.is_valid_pump(pump_id) {
                    return Err(PlcError::InvalidMap(format!(
                        "pump id {} outside 1..={}",
                        pump_id, PUMP_COUNT
                    )));
                }
                if entry.kind != attribute.kind() {
                    return Err(PlcError::InvalidMap(format!(
                        "pump {} {} mapped as {:?}",
                        pump_id, attribute, entry.kind
                    )));
                }
            }
        }

        for pump_id in self.pump_ids() {
            for attribute in Attribute::ALL {
                self.lookup(pump_id, attribute)?;
            }
        }

        let len = self.required_len();
        let mut occupied = vec![0u8; len];
        for entry in self.entries.iter().chain(std::iter::once(&self.alarm)) {
            match (entry.kind, entry.bit) {
                (ValueKind::Bool, Some(bit)) if bit < 8 => {
                    let mask = 1u8 << bit;
                    if occupied[entry.offset] & mask != 0 {
                        return Err(overlap(entry));
                    }
                    occupied[entry.offset] |= mask;
                }
                (ValueKind::Bool, _) => {
                    return Err(PlcError::InvalidMap(format!(
                        "{:?} needs a bit index in 0..8",
                        entry.signal
                    )));
                }
                (ValueKind::Float32, Some(_)) => {
                    return Err(PlcError::InvalidMap(format!(
                        "{:?} is a REAL and cannot carry a bit index",
                        entry.signal
                    )));
                }
                (ValueKind::Float32, None) => {
                    for byte in &mut occupied[entry.offset..entry.end()] {
                        if *byte != 0 {
                            return Err(overlap(entry));
                        }
                        *byte = 0xFF;
                    }
                }
            }
        }

        decoder::decode(&vec![0u8; len], self)?;
        Ok(())
    }
}

impl RegisterEntry {
    fn signal_key(&self) -> (u8, Option<Attribute>) {
        match self.signal {
            Signal::Pump { pump_id, attribute } => (pump_id, Some(attribute)),
            Signal::SystemAlarm => (0, None),
        }
    }
}

fn overlap(entry: &RegisterEntry) -> PlcError {
    PlcError::InvalidMap(format!(
        "{:?} at byte {} overlaps another signal",
        entry.signal, entry.offset
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_layout_offsets() {
        let map = RegisterMap::standard();

        let ready = map.lookup(1, Attribute::Ready).unwrap();
        assert_eq!((ready.offset, ready.bit), (0, Some(0)));

        let trip = map.lookup(2, Attribute::Trip).unwrap();
        assert_eq!((trip.offset, trip.bit), (16, Some(2)));

        let setpoint = map.lookup(7, Attribute::PressureSetpoint).unwrap();
        assert_eq!(setpoint.offset, 108);
        assert_eq!(setpoint.kind, ValueKind::Float32);

        assert_eq!(map.alarm().offset, SYSTEM_ALARM_OFFSET);
        assert_eq!(map.required_len(), 113);
        assert_eq!(map.entries().len(), 42);
    }

    #[test]
    fn test_standard_map_is_valid() {
        RegisterMap::standard().validate().unwrap();
    }

    #[test]
    fn test_unknown_attribute() {
        let map = RegisterMap::standard();
        assert!(matches!(
            map.lookup_name(3, "flow"),
            Err(PlcError::UnknownAttribute { pump_id: 3, .. })
        ));
        assert!(matches!(
            map.lookup(8, Attribute::Speed),
            Err(PlcError::UnknownAttribute { pump_id: 8, .. })
        ));
        assert_eq!(map.lookup_name(3, "speed").unwrap().offset, 40);
    }

    #[test]
    fn test_validate_rejects_missing_attribute() {
        let standard = RegisterMap::standard();
        let entries = standard
            .entries()
            .iter()
            .copied()
            .filter(|e| {
                e.signal
                    != Signal::Pump {
                        pump_id: 4,
                        attribute: Attribute::Speed,
                    }
            })
            .collect();
        let map = RegisterMap::from_entries(entries, *standard.alarm());
        assert!(matches!(
            map.validate(),
            Err(PlcError::UnknownAttribute { pump_id: 4, .. })
        ));
    }

    #[test]
    fn test_validate_rejects_overlap() {
        let standard = RegisterMap::standard();
        let mut entries: Vec<RegisterEntry> = standard.entries().to_vec();
        // Move pump 2 pressure onto pump 2 speed
        for entry in entries.iter_mut() {
            if entry.signal
                == (Signal::Pump {
                    pump_id: 2,
                    attribute: Attribute::Pressure,
                })
            {
                entry.offset = 22;
            }
        }
        let map = RegisterMap::from_entries(entries, *standard.alarm());
        assert!(matches!(map.validate(), Err(PlcError::InvalidMap(_))));
    }

    #[test]
    fn test_validate_rejects_bit_out_of_range() {
        let standard = RegisterMap::standard();
        let mut alarm = *standard.alarm();
        alarm.bit = Some(8);
        let map = RegisterMap::from_entries(standard.entries().to_vec(), alarm);
        assert!(matches!(map.validate(), Err(PlcError::InvalidMap(_))));
    }

    #[test]
    fn test_parameter_info() {
        let map = RegisterMap::standard();
        let info = map
            .lookup(1, Attribute::Pressure)
            .unwrap()
            .parameter_info()
            .unwrap();
        assert_eq!(info.label, "PUMP 1 PRESSURE");
        assert_eq!(info.unit, Some("bar"));
        assert_eq!(info.max, Some(10.0));

        let info = map
            .lookup(5, Attribute::Running)
            .unwrap()
            .parameter_info()
            .unwrap();
        assert_eq!(info.color, Some("green"));
        assert_eq!(info.bit, Some(1));
        assert!(map.alarm().parameter_info().is_none());
    }
}
