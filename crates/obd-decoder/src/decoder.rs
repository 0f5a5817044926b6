//! Decode Pipeline
//!
//! `Raw -> Normalize -> Classify -> Decode -> Result`. Every step is pure;
//! failures along the way are folded into the returned [`DecodedResult`].

use crate::classifier::{classify, normalize_command, DecodePath};
use crate::dtc::{decode_clear, decode_dtcs};
use crate::error::DecodeError;
use crate::normalizer::{Normalized, Normalizer, NormalizerConfig};
use crate::pid::lookup;
use crate::result::{DecodedResult, Payload, RawExchange, Status};
use crate::vehicle_info::decode_vin;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Stateless response decoder. Cheap to share across threads.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    normalizer: Normalizer,
}

impl Decoder {
    pub fn new(config: &NormalizerConfig) -> Self {
        Self {
            normalizer: Normalizer::new(config),
        }
    }

    /// Decode one exchange captured by the transport
    pub fn decode(&self, exchange: &RawExchange) -> DecodedResult {
        let command = normalize_command(&exchange.command);
        let normalized = self.normalizer.normalize(&exchange.raw_response);
        let cleaned = normalized.as_str();

        let outcome = match &normalized {
            Normalized::Sentinel(text) => Err(DecodeError::Sentinel(text.clone())),
            Normalized::Clean(text) if text.is_empty() => {
                debug!(command = %command, "Empty response after normalization");
                let result = DecodedResult::no_data(&command, cleaned, exchange.received_at);
                record(&result);
                return result;
            }
            Normalized::Clean(text) => {
                let path = classify(&command, text);
                debug!(command = %command, ?path, "Classified response");
                decode_path(path, text)
            }
        };

        let result = match outcome {
            Ok(payload) => {
                DecodedResult::success(&command, cleaned, exchange.received_at, payload)
            }
            Err(err) => {
                let status = failure_status(&err);
                debug!(command = %command, error = %err, ?status, "Decode failed");
                DecodedResult::failure(
                    &command,
                    cleaned,
                    exchange.received_at,
                    status,
                    err.to_string(),
                )
            }
        };
        record(&result);
        result
    }

    /// Decode a `(command, response)` pair stamped with the current time
    pub fn decode_response(&self, command: &str, raw_response: &str) -> DecodedResult {
        self.decode(&RawExchange::new(command, raw_response))
    }
}

static DEFAULT_DECODER: LazyLock<Decoder> = LazyLock::new(Decoder::default);

/// Decode with the built-in normalizer vocabulary
pub fn decode(command: &str, raw_response: &str) -> DecodedResult {
    DEFAULT_DECODER.decode_response(command, raw_response)
}

fn decode_path(path: DecodePath, cleaned: &str) -> Result<Payload, DecodeError> {
    match path {
        DecodePath::NumericPid(pid) => decode_numeric(pid, cleaned),
        DecodePath::ReadDtc(source) => decode_dtcs(source, cleaned).map(|dtcs| Payload::Dtcs { dtcs }),
        DecodePath::ClearDtc => decode_clear(cleaned).map(|cleared| Payload::Cleared { cleared }),
        DecodePath::Vin => decode_vin(cleaned).map(|vin| Payload::Vin { vin }),
        DecodePath::NegativeResponse { service, code } => {
            Err(DecodeError::NegativeResponse { service, code })
        }
        DecodePath::Passthrough => Ok(Payload::RawHex {
            raw_hex: cleaned.to_string(),
        }),
    }
}

/// Decode a Mode 01 reply. The payload starts after the echoed `41 <pid>`
/// header, wherever it appears, so echoes and CAN headers are tolerated.
fn decode_numeric(pid: u8, cleaned: &str) -> Result<Payload, DecodeError> {
    let compact: String = cleaned.chars().filter(|c| !c.is_whitespace()).collect();
    let header = format!("41{pid:02X}");
    let payload = compact
        .find(&header)
        .and_then(|start| compact.get(start + header.len()..));

    let Some(spec) = lookup(pid) else {
        debug!(pid, "Unregistered PID, passing payload through");
        return Ok(Payload::RawHex {
            raw_hex: payload.unwrap_or(&compact).to_string(),
        });
    };

    let Some(payload) = payload else {
        warn!(pid, response = %compact, "Mode 01 header missing from response");
        return Err(DecodeError::MissingHeader {
            expected: header,
            response: compact,
        });
    };

    spec.decode_hex(payload).map(Payload::Reading)
}

fn failure_status(err: &DecodeError) -> Status {
    match err {
        DecodeError::NegativeResponse { code, .. } if code.is_unsupported() => Status::Unsupported,
        _ => Status::Error,
    }
}

fn record(result: &DecodedResult) {
    metrics::counter!("obd_decoder_results_total", "status" => result.status().as_str())
        .increment(1);
}
