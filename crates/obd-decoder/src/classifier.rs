//! Command Classification
//!
//! Picks a decode path from the request command, falling back to the
//! leading bytes of the cleaned response when the command is missing or
//! not one the engine models.

use crate::dtc::DtcSource;
use crate::mode;
use crate::nrc::NegativeResponseCode;
use crate::vehicle_info::VIN;

/// Decode path selected for one exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodePath {
    /// Service 01 live data for the given PID
    NumericPid(u8),
    /// Service 03/07/0A trouble code read
    ReadDtc(DtcSource),
    /// Service 04 clear acknowledgement
    ClearDtc,
    /// Service 09 PID 02 vehicle identification number
    Vin,
    /// `7F <service> <code>` rejection
    NegativeResponse {
        service: u8,
        code: NegativeResponseCode,
    },
    /// Anything else, stored as unparsed content
    Passthrough,
}

/// Canonical form of a command: uppercase, no whitespace
pub fn normalize_command(command: &str) -> String {
    command
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase()
}

/// Select the decode path for a normalized command and cleaned response
pub fn classify(command: &str, cleaned: &str) -> DecodePath {
    if let Some(path) = classify_negative(hex_byte(command, 0), cleaned) {
        return path;
    }
    classify_command(command).unwrap_or_else(|| classify_response(cleaned))
}

/// Find a `7F <service> <code>` reply. With a known request service the
/// reply may follow an echo or CAN header but must name that service, and a
/// positive reply to it earlier in the text wins. Without one, only a
/// leading `7F` counts.
fn classify_negative(request: Option<u8>, cleaned: &str) -> Option<DecodePath> {
    let marker = format!("{:02X}", mode::NEGATIVE_RESPONSE);
    for (offset, _) in cleaned.match_indices(marker.as_str()) {
        let (Some(service), Some(code)) =
            (hex_byte(cleaned, offset + 2), hex_byte(cleaned, offset + 4))
        else {
            continue;
        };
        match request {
            Some(request) if request != service => continue,
            None if offset != 0 => continue,
            _ => {}
        }
        let answered = service
            .checked_add(mode::POSITIVE_RESPONSE_OFFSET)
            .is_some_and(|positive| cleaned[..offset].contains(&format!("{positive:02X}")));
        if answered {
            return None;
        }
        return Some(DecodePath::NegativeResponse {
            service,
            code: code.into(),
        });
    }
    None
}

fn classify_command(command: &str) -> Option<DecodePath> {
    let service = hex_byte(command, 0)?;
    match service {
        mode::CURRENT_DATA => hex_byte(command, 2).map(DecodePath::NumericPid),
        mode::READ_DTC if command.len() == 2 => Some(DecodePath::ReadDtc(DtcSource::Stored)),
        mode::PENDING_DTC if command.len() == 2 => Some(DecodePath::ReadDtc(DtcSource::Pending)),
        mode::PERMANENT_DTC if command.len() == 2 => {
            Some(DecodePath::ReadDtc(DtcSource::Permanent))
        }
        mode::CLEAR_DTC if command.len() == 2 => Some(DecodePath::ClearDtc),
        mode::VEHICLE_INFO if command.len() == 4 && hex_byte(command, 2) == Some(VIN) => {
            Some(DecodePath::Vin)
        }
        _ => None,
    }
}

fn classify_response(cleaned: &str) -> DecodePath {
    if cleaned == "OK" {
        return DecodePath::ClearDtc;
    }
    let Some(lead) = hex_byte(cleaned, 0) else {
        return DecodePath::Passthrough;
    };

    match lead.checked_sub(mode::POSITIVE_RESPONSE_OFFSET) {
        Some(mode::CURRENT_DATA) => hex_byte(cleaned, 2)
            .map(DecodePath::NumericPid)
            .unwrap_or(DecodePath::Passthrough),
        Some(mode::READ_DTC) => DecodePath::ReadDtc(DtcSource::Stored),
        Some(mode::PENDING_DTC) => DecodePath::ReadDtc(DtcSource::Pending),
        Some(mode::PERMANENT_DTC) => DecodePath::ReadDtc(DtcSource::Permanent),
        Some(mode::CLEAR_DTC) => DecodePath::ClearDtc,
        Some(mode::VEHICLE_INFO) if hex_byte(cleaned, 2) == Some(VIN) => DecodePath::Vin,
        _ => DecodePath::Passthrough,
    }
}

/// Parse the two hex characters at `offset`
fn hex_byte(text: &str, offset: usize) -> Option<u8> {
    let pair = text.get(offset..offset + 2)?;
    if !pair.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u8::from_str_radix(pair, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_selects_path() {
        assert_eq!(classify("010C", "410C1AF8"), DecodePath::NumericPid(0x0C));
        assert_eq!(classify("03", "43010133"), DecodePath::ReadDtc(DtcSource::Stored));
        assert_eq!(classify("07", "47010420"), DecodePath::ReadDtc(DtcSource::Pending));
        assert_eq!(classify("0A", "4A00"), DecodePath::ReadDtc(DtcSource::Permanent));
        assert_eq!(classify("04", "44"), DecodePath::ClearDtc);
    }

    #[test]
    fn test_command_wins_over_response() {
        // decode path follows the request even if the reply is odd
        assert_eq!(classify("04", "43010133"), DecodePath::ClearDtc);
        assert_eq!(classify("0105", "410D32"), DecodePath::NumericPid(0x05));
    }

    #[test]
    fn test_response_fallback() {
        assert_eq!(classify("", "410D32"), DecodePath::NumericPid(0x0D));
        assert_eq!(classify("", "43010133"), DecodePath::ReadDtc(DtcSource::Stored));
        assert_eq!(classify("", "44"), DecodePath::ClearDtc);
        assert_eq!(classify("", "OK"), DecodePath::ClearDtc);
        assert_eq!(classify("", "4A0101"), DecodePath::ReadDtc(DtcSource::Permanent));
    }

    #[test]
    fn test_unknown_is_passthrough() {
        assert_eq!(classify("0904", "49040131"), DecodePath::Passthrough);
        assert_eq!(classify("", "49040131"), DecodePath::Passthrough);
        assert_eq!(classify("ATZ", "ELM327 V1.5"), DecodePath::Passthrough);
        assert_eq!(classify("", "41"), DecodePath::Passthrough);
        assert_eq!(classify("", ""), DecodePath::Passthrough);
        assert_eq!(classify("03XX", "ABCD"), DecodePath::Passthrough);
    }

    #[test]
    fn test_vin_path() {
        assert_eq!(classify("0902", "49020131"), DecodePath::Vin);
        assert_eq!(classify("", "49020131"), DecodePath::Vin);
    }

    #[test]
    fn test_negative_response() {
        assert_eq!(
            classify("010C", "7F0112"),
            DecodePath::NegativeResponse {
                service: 0x01,
                code: NegativeResponseCode::SubFunctionNotSupported,
            }
        );
        // too short to carry a code
        assert_eq!(classify("", "7F01"), DecodePath::Passthrough);
    }

    #[test]
    fn test_negative_response_after_echo_or_can_header() {
        let expected = DecodePath::NegativeResponse {
            service: 0x01,
            code: NegativeResponseCode::SubFunctionNotSupported,
        };
        assert_eq!(classify("010C", "010C7F0112"), expected);
        assert_eq!(classify("010C", "7E8037F0112"), expected);
        assert_eq!(
            classify("03", "7E8037F0331"),
            DecodePath::NegativeResponse {
                service: 0x03,
                code: NegativeResponseCode::RequestOutOfRange,
            }
        );
    }

    #[test]
    fn test_data_bytes_are_not_a_negative_response() {
        // 7F inside a positive payload
        assert_eq!(classify("0100", "41007F011234"), DecodePath::NumericPid(0x00));
        // names a different service than the request
        assert_eq!(classify("010C", "410C7F0312"), DecodePath::NumericPid(0x0C));
        // unknown request: only a leading 7F counts
        assert_eq!(classify("", "7E8037F0112"), DecodePath::Passthrough);
    }

    #[test]
    fn test_normalize_command() {
        assert_eq!(normalize_command(" 01 0c\r"), "010C");
        assert_eq!(normalize_command("0a"), "0A");
    }
}
