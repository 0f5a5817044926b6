//! Exchange and Result Types
//!
//! [`RawExchange`] is what the transport hands in; [`DecodedResult`] is what
//! display, DTC-scan and logging consumers get back. A result carries a
//! payload only when its status is [`Status::Success`], and an error message
//! only when it is not.

use crate::dtc::Dtc;
use crate::pid::Reading;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One request/response cycle as captured by the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawExchange {
    pub command: String,
    pub raw_response: String,
    pub received_at: DateTime<Utc>,
}

impl RawExchange {
    /// Create an exchange stamped with the current time
    pub fn new(command: impl Into<String>, raw_response: impl Into<String>) -> Self {
        Self::at(command, raw_response, Utc::now())
    }

    pub fn at(
        command: impl Into<String>,
        raw_response: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            command: command.into(),
            raw_response: raw_response.into(),
            received_at,
        }
    }
}

/// Outcome class of a decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    Success,
    Error,
    Timeout,
    NoData,
    Unsupported,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::Timeout => "timeout",
            Status::NoData => "no_data",
            Status::Unsupported => "unsupported",
        }
    }
}

/// Payload of a successful decode; exactly one kind per result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// Physical value of a registered PID
    Reading(Reading),
    /// Trouble codes in payload order
    Dtcs { dtcs: Vec<Dtc> },
    /// Clear-DTC acknowledgement
    Cleared { cleared: bool },
    /// Vehicle identification number
    Vin { vin: String },
    /// Unparsed content (unregistered PID or unmodeled service)
    RawHex {
        #[serde(rename = "rawHex")]
        raw_hex: String,
    },
}

/// Structured result of decoding one exchange
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DecodedResult {
    command: String,
    raw_response: String,
    timestamp: DateTime<Utc>,
    status: Status,
    #[serde(flatten)]
    payload: Option<Payload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl DecodedResult {
    /// Successful decode carrying `payload`
    pub fn success(
        command: impl Into<String>,
        raw_response: impl Into<String>,
        timestamp: DateTime<Utc>,
        payload: Payload,
    ) -> Self {
        Self {
            command: command.into(),
            raw_response: raw_response.into(),
            timestamp,
            status: Status::Success,
            payload: Some(payload),
            error_message: None,
        }
    }

    /// Failed decode. A `Success` status is coerced to `Error` since a
    /// failure never carries a payload.
    pub fn failure(
        command: impl Into<String>,
        raw_response: impl Into<String>,
        timestamp: DateTime<Utc>,
        status: Status,
        message: impl Into<String>,
    ) -> Self {
        let status = match status {
            Status::Success => Status::Error,
            other => other,
        };
        Self {
            command: command.into(),
            raw_response: raw_response.into(),
            timestamp,
            status,
            payload: None,
            error_message: Some(message.into()),
        }
    }

    /// Transport gave up waiting for the adapter
    pub fn timeout(command: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::failure(command, "", timestamp, Status::Timeout, "TIMEOUT")
    }

    /// Adapter answered with nothing usable
    pub fn no_data(
        command: impl Into<String>,
        raw_response: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::failure(command, raw_response, timestamp, Status::NoData, "Empty response")
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Response text after normalization
    pub fn raw_response(&self) -> &str {
        &self.raw_response
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn reading(&self) -> Option<&Reading> {
        match &self.payload {
            Some(Payload::Reading(reading)) => Some(reading),
            _ => None,
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.reading().map(|r| r.value)
    }

    pub fn unit(&self) -> Option<&str> {
        self.reading().map(|r| r.unit)
    }

    pub fn description(&self) -> Option<&str> {
        self.reading().map(|r| r.description.as_str())
    }

    pub fn dtcs(&self) -> Option<&[Dtc]> {
        match &self.payload {
            Some(Payload::Dtcs { dtcs }) => Some(dtcs),
            _ => None,
        }
    }

    pub fn cleared(&self) -> Option<bool> {
        match &self.payload {
            Some(Payload::Cleared { cleared }) => Some(*cleared),
            _ => None,
        }
    }

    pub fn vin(&self) -> Option<&str> {
        match &self.payload {
            Some(Payload::Vin { vin }) => Some(vin),
            _ => None,
        }
    }

    pub fn raw_hex(&self) -> Option<&str> {
        match &self.payload {
            Some(Payload::RawHex { raw_hex }) => Some(raw_hex),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}
