//! OBD-II PID Registry and Value Decoding
//!
//! Every modeled Mode 01 PID is one [`PidSpec`] row in a static table: required
//! data byte count, decode formula, unit, name and valid range. The table is
//! indexed on first access and is read-only afterwards, so lookups are safe
//! from any number of threads.

use crate::error::DecodeError;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::warn;

/// Decode formula for a PID payload
///
/// `A`, `B`, `C`, `D` are the data bytes following the echoed `41 <pid>` header.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Formula {
    /// `(A + offset) * mul / div`
    Byte { offset: f64, mul: f64, div: f64 },
    /// `round(A * 100 / 255)`
    Percent,
    /// `(A*256 + B) / div`, rounded to `decimals` places when set
    Word { div: f64, decimals: Option<i32> },
    /// 32-bit big-endian bitmap `ABCD`
    Bitmap,
    /// Low nibble of A mapped to a fuel system state
    FuelSystem,
    /// A mapped to a commanded secondary air state
    SecondaryAir,
    /// Bit 0 of A: power take-off active
    AuxInput,
}

impl Formula {
    /// Number of data bytes the formula reads
    pub fn bytes_read(&self) -> usize {
        match self {
            Formula::Word { .. } => 2,
            Formula::Bitmap => 4,
            _ => 1,
        }
    }

    /// Apply the formula, returning the value and a state label for
    /// enumerated PIDs. `None` when `data` is too short.
    pub fn evaluate(&self, data: &[u8]) -> Option<(f64, Option<&'static str>)> {
        match *self {
            Formula::Byte { offset, mul, div } => {
                let &[a, ..] = data else { return None };
                Some(((a as f64 + offset) * mul / div, None))
            }
            Formula::Percent => {
                let &[a, ..] = data else { return None };
                Some(((a as f64 * 100.0 / 255.0).round(), None))
            }
            Formula::Word { div, decimals } => {
                let &[a, b, ..] = data else { return None };
                let value = u16::from_be_bytes([a, b]) as f64 / div;
                let value = match decimals {
                    Some(places) => {
                        let factor = 10f64.powi(places);
                        (value * factor).round() / factor
                    }
                    None => value,
                };
                Some((value, None))
            }
            Formula::Bitmap => {
                let &[a, b, c, d, ..] = data else { return None };
                Some((u32::from_be_bytes([a, b, c, d]) as f64, None))
            }
            Formula::FuelSystem => {
                let &[a, ..] = data else { return None };
                let state = a & 0x0F;
                Some((state as f64, Some(fuel_system_label(state))))
            }
            Formula::SecondaryAir => {
                let &[a, ..] = data else { return None };
                Some((a as f64, Some(secondary_air_label(a))))
            }
            Formula::AuxInput => {
                let &[a, ..] = data else { return None };
                let active = a & 0x01;
                let label = if active == 1 { "PTO active" } else { "PTO inactive" };
                Some((active as f64, Some(label)))
            }
        }
    }
}

fn fuel_system_label(state: u8) -> &'static str {
    match state {
        1 => "Open loop (cold)",
        2 => "Closed loop",
        4 => "Open loop (load/decel)",
        8 => "Open loop (fault)",
        _ => "Unknown",
    }
}

fn secondary_air_label(state: u8) -> &'static str {
    match state {
        1 => "Upstream",
        2 => "Downstream",
        4 => "Atmosphere/off",
        8 => "Diagnostic pump on",
        _ => "Not supported",
    }
}

/// Registry row describing one Mode 01 PID
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PidSpec {
    /// PID code (the byte after service 01)
    pub pid: u8,
    /// Human-readable name
    pub name: &'static str,
    /// Physical unit, empty for enumerated states
    pub unit: &'static str,
    /// Data bytes the ECU returns for this PID
    pub data_bytes: usize,
    pub formula: Formula,
    /// Inclusive range the decoded value must fall in
    pub valid_range: (f64, f64),
}

/// A decoded physical value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub value: f64,
    pub unit: &'static str,
    pub description: String,
}

impl PidSpec {
    /// Decode raw data bytes. Only the first `data_bytes` bytes are consumed;
    /// anything after them is ignored.
    pub fn decode(&self, data: &[u8]) -> Result<Reading, DecodeError> {
        if data.len() < self.data_bytes {
            return Err(DecodeError::InsufficientBytes {
                name: self.name,
                expected: self.data_bytes,
                actual: data.len(),
            });
        }

        let (value, label) = self
            .formula
            .evaluate(&data[..self.data_bytes])
            .ok_or(DecodeError::InsufficientBytes {
                name: self.name,
                expected: self.formula.bytes_read(),
                actual: self.data_bytes,
            })?;

        self.validate_range(value)?;

        Ok(Reading {
            value,
            unit: self.unit,
            description: label.unwrap_or(self.name).to_string(),
        })
    }

    /// Decode a hex payload (no whitespace), consuming exactly
    /// `data_bytes * 2` characters.
    pub fn decode_hex(&self, payload: &str) -> Result<Reading, DecodeError> {
        let needed = self.data_bytes * 2;
        if payload.len() < needed {
            return Err(DecodeError::InsufficientBytes {
                name: self.name,
                expected: self.data_bytes,
                actual: payload.len() / 2,
            });
        }
        let data = hex::decode(payload.get(..needed).unwrap_or(payload))?;
        self.decode(&data)
    }

    /// Check a value against the valid range
    pub fn validate_range(&self, value: f64) -> Result<(), DecodeError> {
        let (min, max) = self.valid_range;
        if value < min || value > max {
            warn!(pid = self.pid, value, min, max, "Decoded value outside valid range");
            Err(DecodeError::OutOfRange {
                field: self.name,
                value,
                min,
                max,
            })
        } else {
            Ok(())
        }
    }
}

const fn byte(
    pid: u8,
    name: &'static str,
    unit: &'static str,
    offset: f64,
    mul: f64,
    div: f64,
    valid_range: (f64, f64),
) -> PidSpec {
    PidSpec {
        pid,
        name,
        unit,
        data_bytes: 1,
        formula: Formula::Byte { offset, mul, div },
        valid_range,
    }
}

const fn percent(pid: u8, name: &'static str) -> PidSpec {
    PidSpec {
        pid,
        name,
        unit: "%",
        data_bytes: 1,
        formula: Formula::Percent,
        valid_range: (0.0, 100.0),
    }
}

const fn word(
    pid: u8,
    name: &'static str,
    unit: &'static str,
    div: f64,
    decimals: Option<i32>,
    max: f64,
) -> PidSpec {
    PidSpec {
        pid,
        name,
        unit,
        data_bytes: 2,
        formula: Formula::Word { div, decimals },
        valid_range: (0.0, max),
    }
}

const fn state(pid: u8, name: &'static str, formula: Formula, max: f64) -> PidSpec {
    PidSpec {
        pid,
        name,
        unit: "",
        data_bytes: 1,
        formula,
        valid_range: (0.0, max),
    }
}

const fn bitmap(pid: u8, name: &'static str) -> PidSpec {
    PidSpec {
        pid,
        name,
        unit: "",
        data_bytes: 4,
        formula: Formula::Bitmap,
        valid_range: (0.0, BITMAP_MAX),
    }
}

const fn o2_voltage(pid: u8, name: &'static str) -> PidSpec {
    PidSpec {
        pid,
        name,
        unit: "V",
        data_bytes: 2,
        formula: Formula::Byte {
            offset: 0.0,
            mul: 1.0,
            div: 200.0,
        },
        valid_range: (0.0, 1.275),
    }
}

const BITMAP_MAX: f64 = 4_294_967_295.0;
const TEMPERATURE: (f64, f64) = (-40.0, 215.0);
const FUEL_TRIM: (f64, f64) = (-100.0, 99.21875);

/// Standard SAE J1979 Mode 01 PIDs
static STANDARD_PIDS: &[PidSpec] = &[
    bitmap(0x00, "PIDs supported [01-20]"),
    state(0x03, "Fuel System Status", Formula::FuelSystem, 15.0),
    percent(0x04, "Engine Load"),
    byte(0x05, "Coolant Temp", "°C", -40.0, 1.0, 1.0, TEMPERATURE),
    byte(0x06, "Short Term Fuel Trim Bank 1", "%", -128.0, 100.0, 128.0, FUEL_TRIM),
    byte(0x07, "Long Term Fuel Trim Bank 1", "%", -128.0, 100.0, 128.0, FUEL_TRIM),
    byte(0x08, "Short Term Fuel Trim Bank 2", "%", -128.0, 100.0, 128.0, FUEL_TRIM),
    byte(0x09, "Long Term Fuel Trim Bank 2", "%", -128.0, 100.0, 128.0, FUEL_TRIM),
    byte(0x0A, "Fuel Pressure", "kPa", 0.0, 3.0, 1.0, (0.0, 765.0)),
    byte(0x0B, "Manifold Pressure", "kPa", 0.0, 1.0, 1.0, (0.0, 255.0)),
    word(0x0C, "Engine RPM", "RPM", 4.0, None, 16383.75),
    byte(0x0D, "Vehicle Speed", "km/h", 0.0, 1.0, 1.0, (0.0, 255.0)),
    byte(0x0E, "Timing Advance", "°", -128.0, 1.0, 2.0, (-64.0, 63.5)),
    byte(0x0F, "Intake Air Temp", "°C", -40.0, 1.0, 1.0, TEMPERATURE),
    word(0x10, "MAF Flow", "g/s", 100.0, Some(2), 655.35),
    percent(0x11, "Throttle Position"),
    state(0x12, "Secondary Air Status", Formula::SecondaryAir, 255.0),
    o2_voltage(0x14, "O2 Sensor 1 Voltage"),
    o2_voltage(0x15, "O2 Sensor 2 Voltage"),
    o2_voltage(0x16, "O2 Sensor 3 Voltage"),
    o2_voltage(0x17, "O2 Sensor 4 Voltage"),
    o2_voltage(0x18, "O2 Sensor 5 Voltage"),
    o2_voltage(0x19, "O2 Sensor 6 Voltage"),
    o2_voltage(0x1A, "O2 Sensor 7 Voltage"),
    o2_voltage(0x1B, "O2 Sensor 8 Voltage"),
    state(0x1E, "Auxiliary Input Status", Formula::AuxInput, 1.0),
    word(0x1F, "Run Time Since Start", "s", 1.0, None, 65535.0),
    bitmap(0x20, "PIDs supported [21-40]"),
    word(0x21, "Distance With MIL On", "km", 1.0, None, 65535.0),
    percent(0x2F, "Fuel Tank Level"),
    byte(0x30, "Warm-ups Since Codes Cleared", "count", 0.0, 1.0, 1.0, (0.0, 255.0)),
    word(0x31, "Distance Since Codes Cleared", "km", 1.0, None, 65535.0),
    byte(0x33, "Barometric Pressure", "kPa", 0.0, 1.0, 1.0, (0.0, 255.0)),
    bitmap(0x40, "PIDs supported [41-60]"),
    word(0x42, "Control Module Voltage", "V", 1000.0, Some(3), 65.535),
    byte(0x46, "Ambient Air Temp", "°C", -40.0, 1.0, 1.0, TEMPERATURE),
    word(0x4D, "Time Run With MIL On", "min", 1.0, None, 65535.0),
    word(0x4E, "Time Since Codes Cleared", "min", 1.0, None, 65535.0),
    bitmap(0x60, "PIDs supported [61-80]"),
    bitmap(0x80, "PIDs supported [81-A0]"),
    bitmap(0xA0, "PIDs supported [A1-C0]"),
    bitmap(0xC0, "PIDs supported [C1-E0]"),
];

/// Registry of modeled PIDs, keyed by PID code
pub static PID_REGISTRY: LazyLock<HashMap<u8, &'static PidSpec>> =
    LazyLock::new(|| STANDARD_PIDS.iter().map(|spec| (spec.pid, spec)).collect());

/// Look up the spec for a PID
pub fn lookup(pid: u8) -> Option<&'static PidSpec> {
    PID_REGISTRY.get(&pid).copied()
}

/// All registered PIDs in ascending order
pub fn registered_pids() -> impl Iterator<Item = &'static PidSpec> {
    STANDARD_PIDS.iter()
}

/// Decode data bytes for a PID through the registry
pub fn decode_pid(pid: u8, data: &[u8]) -> Result<Reading, DecodeError> {
    lookup(pid)
        .ok_or(DecodeError::UnsupportedPid(pid))?
        .decode(data)
}

/// Expand a supported-PIDs bitmap (response to PID `00`, `20`, `40`, ...)
/// into the PID codes it advertises. The MSB of the first byte is `base + 1`.
pub fn supported_pids(base: u8, data: &[u8]) -> Vec<u8> {
    data.iter()
        .take(4)
        .enumerate()
        .flat_map(|(byte_idx, byte)| {
            (0..8u8).filter_map(move |bit| {
                if byte & (0x80 >> bit) != 0 {
                    base.checked_add(byte_idx as u8 * 8 + bit + 1)
                } else {
                    None
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn value(pid: u8, data: &[u8]) -> f64 {
        decode_pid(pid, data).unwrap().value
    }

    #[test]
    fn test_formula_table() {
        // (pid, bytes, expected value, unit)
        let cases: &[(u8, &[u8], f64, &str)] = &[
            (0x0C, &[0x1A, 0xF8], 1726.0, "RPM"),
            (0x0C, &[0x1A, 0x2B], 1674.75, "RPM"),
            (0x0D, &[0x55], 85.0, "km/h"),
            (0x05, &[0x73], 75.0, "°C"),
            (0x05, &[0x00], -40.0, "°C"),
            (0x0F, &[0x3C], 20.0, "°C"),
            (0x04, &[0xFF], 100.0, "%"),
            (0x04, &[0x80], 50.0, "%"),
            (0x11, &[0x33], 20.0, "%"),
            (0x0A, &[0x64], 300.0, "kPa"),
            (0x0B, &[0x65], 101.0, "kPa"),
            (0x10, &[0x01, 0x23], 2.91, "g/s"),
            (0x10, &[0xFF, 0xFF], 655.35, "g/s"),
            (0x06, &[0x80], 0.0, "%"),
            (0x07, &[0x90], 12.5, "%"),
            (0x08, &[0x00], -100.0, "%"),
            (0x09, &[0x70], -12.5, "%"),
            (0x0E, &[0x80], 0.0, "°"),
            (0x0E, &[0x94], 10.0, "°"),
            (0x0E, &[0x00], -64.0, "°"),
            (0x1F, &[0x01, 0x2C], 300.0, "s"),
        ];

        for &(pid, data, expected, unit) in cases {
            let reading = decode_pid(pid, data).unwrap();
            assert!(
                (reading.value - expected).abs() < 1e-9,
                "PID {:02X} {:?}: got {}, expected {}",
                pid,
                data,
                reading.value,
                expected
            );
            assert_eq!(reading.unit, unit, "PID {:02X}", pid);
        }
    }

    #[test]
    fn test_fuel_system_status() {
        let cases = [
            (0x01, 1.0, "Open loop (cold)"),
            (0x02, 2.0, "Closed loop"),
            (0x04, 4.0, "Open loop (load/decel)"),
            (0x08, 8.0, "Open loop (fault)"),
            (0x03, 3.0, "Unknown"),
            // high nibble is ignored
            (0x12, 2.0, "Closed loop"),
        ];
        for (a, expected, label) in cases {
            let reading = decode_pid(0x03, &[a]).unwrap();
            assert_eq!(reading.value, expected);
            assert_eq!(reading.description, label);
        }
    }

    #[test]
    fn test_secondary_air_status() {
        let cases = [
            (0x01, "Upstream"),
            (0x02, "Downstream"),
            (0x04, "Atmosphere/off"),
            (0x08, "Diagnostic pump on"),
            (0x10, "Not supported"),
        ];
        for (a, label) in cases {
            let reading = decode_pid(0x12, &[a]).unwrap();
            assert_eq!(reading.value, a as f64);
            assert_eq!(reading.description, label);
        }
    }

    #[test]
    fn test_aux_input_status() {
        let active = decode_pid(0x1E, &[0x01]).unwrap();
        assert_eq!(active.value, 1.0);
        assert_eq!(active.description, "PTO active");

        let inactive = decode_pid(0x1E, &[0xFE]).unwrap();
        assert_eq!(inactive.value, 0.0);
        assert_eq!(inactive.description, "PTO inactive");
    }

    #[test]
    fn test_numeric_description_is_name() {
        let reading = decode_pid(0x0C, &[0x1A, 0xF8]).unwrap();
        assert_eq!(reading.description, "Engine RPM");
    }

    #[test]
    fn test_supplemental_pids() {
        assert_eq!(value(0x2F, &[0xFF]), 100.0);
        assert_eq!(value(0x33, &[0x65]), 101.0);
        assert_eq!(value(0x46, &[0x41]), 25.0);
        assert_eq!(value(0x42, &[0x31, 0x9C]), 12.7);
        assert_eq!(value(0x14, &[0x5A, 0x80]), 0.45);
        assert_eq!(value(0x00, &[0xBE, 0x1F, 0xA8, 0x13]), 0xBE1FA813u32 as f64);
    }

    #[test]
    fn test_insufficient_bytes() {
        let err = decode_pid(0x0C, &[0x1A]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InsufficientBytes {
                name: "Engine RPM",
                expected: 2,
                actual: 1,
            }
        );
        assert!(decode_pid(0x0D, &[]).is_err());
    }

    #[test]
    fn test_extra_bytes_ignored() {
        assert_eq!(value(0x0D, &[0x55, 0xAA, 0xBB]), 85.0);
    }

    #[test]
    fn test_unregistered_pid() {
        assert_eq!(decode_pid(0x5C, &[0x7B]), Err(DecodeError::UnsupportedPid(0x5C)));
    }

    #[test]
    fn test_decode_hex() {
        let spec = lookup(0x0C).unwrap();
        assert_eq!(spec.decode_hex("1AF8").unwrap().value, 1726.0);
        // trailing odd nibble is never read
        assert_eq!(spec.decode_hex("1AF80").unwrap().value, 1726.0);
        assert!(matches!(
            spec.decode_hex("1A"),
            Err(DecodeError::InsufficientBytes { actual: 1, .. })
        ));
        assert!(matches!(spec.decode_hex("1AZZ"), Err(DecodeError::InvalidHex(_))));
    }

    #[test]
    fn test_supported_pids() {
        let pids = supported_pids(0x00, &[0xBE, 0x1F, 0xA8, 0x13]);
        assert_eq!(&pids[..6], &[0x01, 0x03, 0x04, 0x05, 0x06, 0x07]);
        assert!(pids.contains(&0x0C));
        assert!(pids.contains(&0x20));
        assert!(!pids.contains(&0x02));

        assert_eq!(supported_pids(0x20, &[0x80, 0x00, 0x00, 0x01]), vec![0x21, 0x40]);
        assert!(supported_pids(0x00, &[]).is_empty());
    }

    #[test]
    fn test_registry_integrity() {
        let mut seen = HashSet::new();
        for spec in registered_pids() {
            assert!(seen.insert(spec.pid), "duplicate PID {:02X}", spec.pid);
            assert!(
                spec.formula.bytes_read() <= spec.data_bytes,
                "PID {:02X} formula reads past its data bytes",
                spec.pid
            );
            assert!(spec.valid_range.0 <= spec.valid_range.1);
            assert_eq!(lookup(spec.pid), Some(spec));
        }
        assert_eq!(PID_REGISTRY.len(), seen.len());
    }

    #[test]
    fn test_single_byte_pids_stay_in_range() {
        for spec in registered_pids().filter(|s| s.data_bytes == 1) {
            for a in 0..=255u8 {
                assert!(spec.decode(&[a]).is_ok(), "PID {:02X} A={}", spec.pid, a);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_registered_pids_decode_in_range(data in proptest::collection::vec(any::<u8>(), 4)) {
            for spec in registered_pids() {
                let reading = spec.decode(&data);
                prop_assert!(reading.is_ok(), "PID {:02X} {:?}: {:?}", spec.pid, data, reading);
            }
        }

        #[test]
        fn prop_short_payload_is_error_not_panic(data in proptest::collection::vec(any::<u8>(), 0..2)) {
            for spec in registered_pids().filter(|s| s.data_bytes > data.len()) {
                let is_insufficient = matches!(
                    spec.decode(&data),
                    Err(DecodeError::InsufficientBytes { .. })
                );
                prop_assert!(is_insufficient);
            }
        }
    }
}
