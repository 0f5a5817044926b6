//! OBD-II Decode Error Types

use crate::nrc::NegativeResponseCode;
use thiserror::Error;

/// Errors that can occur while decoding an adapter response
///
/// None of these abort a batch of reads: the decoder folds each one into a
/// [`DecodedResult`](crate::DecodedResult) carrying the rendered message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Adapter reported a failure sentinel (NO DATA, ERROR, ?, ...)
    #[error("{0}")]
    Sentinel(String),

    /// Registered PID answered with fewer data bytes than its formula needs
    #[error("{name}: expected {expected} data bytes, got {actual}")]
    InsufficientBytes {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Payload contains characters that are not hex digits
    #[error("Invalid hex payload: {0}")]
    InvalidHex(String),

    /// Echoed mode+PID header not found in the response
    #[error("Response header {expected} not found in {response}")]
    MissingHeader { expected: String, response: String },

    /// Decoded value falls outside the PID's valid range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// PID has no registry entry
    #[error("PID {0:02X} is not registered")]
    UnsupportedPid(u8),

    /// ECU answered with a 7F negative response
    #[error("Negative response to service {service:02X}: {code}")]
    NegativeResponse {
        service: u8,
        code: NegativeResponseCode,
    },

    /// String is not a well-formed `P0133`-style trouble code
    #[error("Invalid DTC: {0}")]
    InvalidDtc(String),

    /// Mode 09 reply did not carry a 17-character VIN
    #[error("Expected a 17-character VIN, got {0:?}")]
    InvalidVin(String),

    /// Clear-DTC request was not acknowledged
    #[error("Clear DTC not acknowledged: {0}")]
    ClearRejected(String),
}

impl From<hex::FromHexError> for DecodeError {
    fn from(err: hex::FromHexError) -> Self {
        DecodeError::InvalidHex(err.to_string())
    }
}
