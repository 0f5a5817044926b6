//! Negative Response Codes
//!
//! An ECU that rejects a request answers `7F <service> <code>` instead of the
//! positive response byte.

use serde::Serialize;
use std::fmt;

/// Negative response code carried in the third byte of a `7F` response
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize)]
pub enum NegativeResponseCode {
    GeneralReject,
    ServiceNotSupported,
    SubFunctionNotSupported,
    BusyRepeatRequest,
    ConditionsNotCorrect,
    RequestOutOfRange,
    ResponsePending,
    NonStandard(u8),
}

impl NegativeResponseCode {
    /// Whether the code means the vehicle does not implement the request
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            NegativeResponseCode::ServiceNotSupported
                | NegativeResponseCode::SubFunctionNotSupported
                | NegativeResponseCode::RequestOutOfRange
        )
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            NegativeResponseCode::GeneralReject => 0x10,
            NegativeResponseCode::ServiceNotSupported => 0x11,
            NegativeResponseCode::SubFunctionNotSupported => 0x12,
            NegativeResponseCode::BusyRepeatRequest => 0x21,
            NegativeResponseCode::ConditionsNotCorrect => 0x22,
            NegativeResponseCode::RequestOutOfRange => 0x31,
            NegativeResponseCode::ResponsePending => 0x78,
            NegativeResponseCode::NonStandard(val) => *val,
        }
    }
}

impl From<u8> for NegativeResponseCode {
    fn from(val: u8) -> NegativeResponseCode {
        match val {
            0x10 => NegativeResponseCode::GeneralReject,
            0x11 => NegativeResponseCode::ServiceNotSupported,
            0x12 => NegativeResponseCode::SubFunctionNotSupported,
            0x21 => NegativeResponseCode::BusyRepeatRequest,
            0x22 => NegativeResponseCode::ConditionsNotCorrect,
            0x31 => NegativeResponseCode::RequestOutOfRange,
            0x78 => NegativeResponseCode::ResponsePending,
            _ => NegativeResponseCode::NonStandard(val),
        }
    }
}

impl fmt::Display for NegativeResponseCode {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            NegativeResponseCode::GeneralReject => "general reject",
            NegativeResponseCode::ServiceNotSupported => "service not supported",
            NegativeResponseCode::SubFunctionNotSupported => "sub-function not supported",
            NegativeResponseCode::BusyRepeatRequest => "busy, repeat request",
            NegativeResponseCode::ConditionsNotCorrect => "conditions not correct",
            NegativeResponseCode::RequestOutOfRange => "request out of range",
            NegativeResponseCode::ResponsePending => "response pending",
            NegativeResponseCode::NonStandard(_) => "non-standard code",
        };
        write!(fmt, "{} ({:02X})", label, self.as_byte())
    }
}
