//! Diagnostic Trouble Code Codec (SAE J2012)
//!
//! Decodes Mode 03/07/0A payloads into [`Dtc`] values and Mode 04 replies into
//! a cleared flag.

use crate::error::DecodeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// System a DTC belongs to, from the top two bits of its first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DtcSystem {
    Powertrain,
    Chassis,
    Body,
    Network,
}

impl DtcSystem {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => DtcSystem::Powertrain,
            1 => DtcSystem::Chassis,
            2 => DtcSystem::Body,
            _ => DtcSystem::Network,
        }
    }

    fn bits(&self) -> u8 {
        match self {
            DtcSystem::Powertrain => 0,
            DtcSystem::Chassis => 1,
            DtcSystem::Body => 2,
            DtcSystem::Network => 3,
        }
    }

    /// Prefix letter (`P`, `C`, `B`, `U`)
    pub fn prefix(&self) -> char {
        match self {
            DtcSystem::Powertrain => 'P',
            DtcSystem::Chassis => 'C',
            DtcSystem::Body => 'B',
            DtcSystem::Network => 'U',
        }
    }

    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix.to_ascii_uppercase() {
            'P' => Some(DtcSystem::Powertrain),
            'C' => Some(DtcSystem::Chassis),
            'B' => Some(DtcSystem::Body),
            'U' => Some(DtcSystem::Network),
            _ => None,
        }
    }
}

/// A diagnostic trouble code: system prefix plus four hex digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Dtc {
    /// The two raw bytes, big-endian
    raw: u16,
}

impl Dtc {
    pub fn from_bytes(a: u8, b: u8) -> Self {
        Self {
            raw: u16::from_be_bytes([a, b]),
        }
    }

    pub fn to_bytes(&self) -> [u8; 2] {
        self.raw.to_be_bytes()
    }

    pub fn system(&self) -> DtcSystem {
        DtcSystem::from_bits((self.raw >> 14) as u8)
    }

    /// Whether the code is SAE-defined rather than manufacturer-controlled
    pub fn is_generic(&self) -> bool {
        let first = (self.raw >> 12) & 0x03;
        let second = (self.raw >> 8) & 0x0F;
        match self.system() {
            DtcSystem::Powertrain => {
                first == 0 || first == 2 || (first == 3 && (4..=9).contains(&second))
            }
            _ => first == 0 || first == 3,
        }
    }

    /// Short description for common generic codes
    pub fn description(&self) -> Option<&'static str> {
        if self.system() != DtcSystem::Powertrain {
            return None;
        }
        COMMON_POWERTRAIN_DTCS
            .binary_search_by_key(&self.raw, |&(code, _)| code)
            .ok()
            .map(|idx| COMMON_POWERTRAIN_DTCS[idx].1)
    }
}

impl fmt::Display for Dtc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b] = self.to_bytes();
        write!(
            f,
            "{}{:X}{:X}{:X}{:X}",
            self.system().prefix(),
            (a >> 4) & 0x03,
            a & 0x0F,
            b >> 4,
            b & 0x0F
        )
    }
}

impl FromStr for Dtc {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DecodeError::InvalidDtc(s.to_string());
        if s.len() != 5 || !s.is_ascii() || !s[1..].chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let system = s
            .chars()
            .next()
            .and_then(DtcSystem::from_prefix)
            .ok_or_else(invalid)?;
        let digits = u16::from_str_radix(&s[1..], 16).map_err(|_| invalid())?;
        if digits > 0x3FFF {
            return Err(invalid());
        }
        Ok(Self {
            raw: (system.bits() as u16) << 14 | digits,
        })
    }
}

impl From<Dtc> for String {
    fn from(dtc: Dtc) -> Self {
        dtc.to_string()
    }
}

impl TryFrom<String> for Dtc {
    type Error = DecodeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Which stored-code service a DTC read targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DtcSource {
    /// Service 03, confirmed codes
    Stored,
    /// Service 07, pending codes
    Pending,
    /// Service 0A, permanent codes
    Permanent,
}

impl DtcSource {
    pub fn service(&self) -> u8 {
        match self {
            DtcSource::Stored => crate::mode::READ_DTC,
            DtcSource::Pending => crate::mode::PENDING_DTC,
            DtcSource::Permanent => crate::mode::PERMANENT_DTC,
        }
    }

    /// Positive response byte the ECU echoes (`service + 0x40`)
    pub fn response_byte(&self) -> u8 {
        self.service() + crate::mode::POSITIVE_RESPONSE_OFFSET
    }
}

/// Decode a cleaned DTC response.
///
/// Locates the positive response byte, skips exactly one count byte, then
/// reads 2-byte pairs until a `0000` terminator or fewer than two bytes
/// remain. A trailing odd byte is dropped, and the list is truncated at the
/// first byte that is not valid hex.
pub fn decode_dtcs(source: DtcSource, cleaned: &str) -> Result<Vec<Dtc>, DecodeError> {
    let hex: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    let marker = format!("{:02X}", source.response_byte());

    let start = hex.find(&marker).ok_or_else(|| DecodeError::MissingHeader {
        expected: marker.clone(),
        response: hex.clone(),
    })?;
    let bytes = leading_hex_bytes(&hex[start + marker.len()..]);

    let Some((&count, pairs)) = bytes.split_first() else {
        debug!(response = %hex, "DTC response has no count byte");
        return Ok(Vec::new());
    };

    let mut dtcs = Vec::new();
    let mut chunks = pairs.chunks_exact(2);
    for pair in chunks.by_ref() {
        let (a, b) = (pair[0], pair[1]);
        if a == 0 && b == 0 {
            break;
        }
        dtcs.push(Dtc::from_bytes(a, b));
    }

    if !chunks.remainder().is_empty() {
        debug!(
            trailing = chunks.remainder().len(),
            "Dropped truncated DTC pair"
        );
    }
    if count as usize != dtcs.len() {
        debug!(count, decoded = dtcs.len(), "DTC count byte disagrees with payload");
    }

    Ok(dtcs)
}

/// Bytes of `text` up to the first pair that is not valid hex
pub(crate) fn leading_hex_bytes(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() / 2);
    for pair in text.as_bytes().chunks_exact(2) {
        let mut byte = [0u8; 1];
        if hex::decode_to_slice(pair, &mut byte).is_err() {
            debug!(
                offset = bytes.len(),
                "Non-hex data in payload, truncating"
            );
            break;
        }
        bytes.push(byte[0]);
    }
    bytes
}

/// Decode a Mode 04 reply: acknowledged iff it is `OK` or starts with `44`,
/// after an optional echo of the `04` request
pub fn decode_clear(cleaned: &str) -> Result<bool, DecodeError> {
    let echo = format!("{:02X}", crate::mode::CLEAR_DTC);
    let marker = format!(
        "{:02X}",
        crate::mode::CLEAR_DTC + crate::mode::POSITIVE_RESPONSE_OFFSET
    );
    let reply = cleaned
        .strip_prefix(&echo)
        .map(str::trim_start)
        .unwrap_or(cleaned);
    if reply == "OK" || reply.starts_with(&marker) {
        Ok(true)
    } else {
        warn!(response = %cleaned, "Unexpected reply to clear DTC request");
        Err(DecodeError::ClearRejected(cleaned.to_string()))
    }
}

/// Common generic powertrain codes, sorted by raw value
static COMMON_POWERTRAIN_DTCS: &[(u16, &str)] = &[
    (0x0100, "Mass or Volume Air Flow Circuit Malfunction"),
    (0x0101, "Mass or Volume Air Flow Circuit Range/Performance Problem"),
    (0x0102, "Mass or Volume Air Flow Circuit Low Input"),
    (0x0103, "Mass or Volume Air Flow Circuit High Input"),
    (0x0105, "Manifold Absolute Pressure/Barometric Pressure Circuit Malfunction"),
    (0x0110, "Intake Air Temperature Circuit Malfunction"),
    (0x0115, "Engine Coolant Temperature Circuit Malfunction"),
    (0x0120, "Throttle/Pedal Position Sensor/Switch A Circuit Malfunction"),
    (0x0130, "O2 Sensor Circuit Malfunction (Bank 1, Sensor 1)"),
    (0x0131, "O2 Sensor Circuit Low Voltage (Bank 1, Sensor 1)"),
    (0x0132, "O2 Sensor Circuit High Voltage (Bank 1, Sensor 1)"),
    (0x0133, "O2 Sensor Circuit Slow Response (Bank 1, Sensor 1)"),
    (0x0134, "O2 Sensor Circuit No Activity Detected (Bank 1, Sensor 1)"),
    (0x0135, "O2 Sensor Heater Circuit Malfunction (Bank 1, Sensor 1)"),
    (0x0171, "System Too Lean (Bank 1)"),
    (0x0172, "System Too Rich (Bank 1)"),
    (0x0300, "Random/Multiple Cylinder Misfire Detected"),
    (0x0301, "Cylinder 1 Misfire Detected"),
    (0x0302, "Cylinder 2 Misfire Detected"),
    (0x0303, "Cylinder 3 Misfire Detected"),
    (0x0304, "Cylinder 4 Misfire Detected"),
    (0x0305, "Cylinder 5 Misfire Detected"),
    (0x0306, "Cylinder 6 Misfire Detected"),
    (0x0307, "Cylinder 7 Misfire Detected"),
    (0x0308, "Cylinder 8 Misfire Detected"),
    (0x0420, "Catalyst System Efficiency Below Threshold (Bank 1)"),
    (0x0430, "Catalyst System Efficiency Below Threshold (Bank 2)"),
    (0x0440, "Evaporative Emission Control System Malfunction"),
    (0x0442, "Evaporative Emission Control System Leak Detected (Small Leak)"),
    (0x0446, "Evaporative Emission Control System Vent Control Circuit Malfunction"),
    (0x0455, "Evaporative Emission Control System Leak Detected (Large Leak)"),
    (0x0500, "Vehicle Speed Sensor Malfunction"),
    (0x0505, "Idle Control System Malfunction"),
    (0x0506, "Idle Control System RPM Lower Than Expected"),
    (0x0507, "Idle Control System RPM Higher Than Expected"),
    (0x0600, "Serial Communication Link Malfunction"),
    (0x0601, "Internal Control Module Memory Checksum Error"),
    (0x0603, "Internal Control Module Keep Alive Memory (KAM) Error"),
];
