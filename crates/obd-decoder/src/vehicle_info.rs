//! Mode 09 Vehicle Information

use crate::dtc::leading_hex_bytes;
use crate::error::DecodeError;
use crate::mode;
use tracing::warn;

/// Mode 09 PID carrying the Vehicle Identification Number
pub const VIN: u8 = 0x02;

/// Characters in a VIN (ISO 3779)
pub const VIN_LENGTH: usize = 17;

/// Decode a Mode 09 PID 02 reply into the VIN.
///
/// Each `49 02` message is followed by a one-byte message counter and then
/// ASCII data. CAN adapters send one message, legacy protocols send five
/// with four data bytes each; both are handled by collecting the printable
/// characters after every header.
pub fn decode_vin(cleaned: &str) -> Result<String, DecodeError> {
    let hex: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    let marker = format!(
        "{:02X}{:02X}",
        mode::VEHICLE_INFO + mode::POSITIVE_RESPONSE_OFFSET,
        VIN
    );
    if !hex.contains(&marker) {
        return Err(DecodeError::MissingHeader {
            expected: marker,
            response: hex,
        });
    }

    let text: String = hex
        .split(marker.as_str())
        .skip(1)
        .flat_map(|message| leading_hex_bytes(message).into_iter().skip(1))
        .filter(|byte| (0x20..=0x7E).contains(byte))
        .map(char::from)
        .collect();
    let vin = text.trim();

    if vin.len() != VIN_LENGTH {
        warn!(vin, "VIN has unexpected length");
        return Err(DecodeError::InvalidVin(vin.to_string()));
    }
    Ok(vin.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_single_message() {
        let vin = decode_vin("4902013147314A43353434345237323532333637").unwrap();
        assert_eq!(vin, "1G1JC5444R7252367");
    }

    #[test]
    fn test_legacy_five_messages() {
        let cleaned = "49 02 01 00 00 00 31 49 02 02 47 31 4A 43 49 02 03 35 34 34 34 \
                       49 02 04 52 37 32 35 49 02 05 32 33 36 37";
        assert_eq!(decode_vin(cleaned).unwrap(), "1G1JC5444R7252367");
    }

    #[test]
    fn test_echo_before_header() {
        let vin = decode_vin("09024902013147314A43353434345237323532333637").unwrap();
        assert_eq!(vin, "1G1JC5444R7252367");
    }

    #[test]
    fn test_wrong_length() {
        assert_eq!(
            decode_vin("4902013147314A43"),
            Err(DecodeError::InvalidVin("1G1JC".to_string()))
        );
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            decode_vin("4904013147"),
            Err(DecodeError::MissingHeader { .. })
        ));
    }
}
