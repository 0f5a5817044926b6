//! OBD-II Response Decoding
//!
//! This crate turns raw ELM327-style adapter responses into structured
//! results: Mode 01 live data through a static PID registry, Mode 03/07/0A
//! trouble codes, Mode 04 clear acknowledgements, the Mode 09 VIN and
//! negative responses.
//! Decoding is pure and synchronous; the transport that produced the text
//! is someone else's concern.

mod classifier;
mod decoder;
pub mod dtc;
mod error;
pub mod normalizer;
mod nrc;
pub mod pid;
mod result;
pub mod vehicle_info;

pub use classifier::{classify, normalize_command, DecodePath};
pub use decoder::{decode, Decoder};
pub use dtc::{Dtc, DtcSource, DtcSystem};
pub use error::DecodeError;
pub use normalizer::{normalize, Normalized, Normalizer, NormalizerConfig};
pub use nrc::NegativeResponseCode;
pub use pid::{decode_pid, lookup, supported_pids, Formula, PidSpec, Reading};
pub use result::{DecodedResult, Payload, RawExchange, Status};
pub use vehicle_info::decode_vin;

/// OBD-II mode constants
pub mod mode {
    /// Current data
    pub const CURRENT_DATA: u8 = 0x01;
    /// Diagnostic trouble codes
    pub const READ_DTC: u8 = 0x03;
    /// Clear trouble codes
    pub const CLEAR_DTC: u8 = 0x04;
    /// Pending trouble codes (current or last drive cycle)
    pub const PENDING_DTC: u8 = 0x07;
    /// Vehicle information
    pub const VEHICLE_INFO: u8 = 0x09;
    /// Permanent trouble codes
    pub const PERMANENT_DTC: u8 = 0x0A;
    /// Added to the service id in a positive response (`01` -> `41`)
    pub const POSITIVE_RESPONSE_OFFSET: u8 = 0x40;
    /// First byte of a negative response
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;
}
