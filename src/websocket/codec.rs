//! Envelope codec for the `{type, payload, timestamp}` wire format.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::connection_manager::Frame;

/// Why an inbound frame could not be turned into an [`Envelope`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("envelope is not a JSON object")]
    NotAnObject,

    #[error("envelope has no \"type\" field")]
    MissingType,

    #[error("envelope \"type\" is not a string")]
    TypeNotString,
}

/// A decoded inbound envelope. Any inbound `timestamp` is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub kind: String,
    pub payload: Value,
}

#[derive(Serialize)]
struct OutboundEnvelope<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    payload: &'a Value,
    timestamp: i64,
}

/// Serialize an outbound envelope. A `null` payload is encoded as `null`.
pub fn encode(kind: &str, payload: &Value, timestamp: i64) -> Result<Frame, serde_json::Error> {
    let text = serde_json::to_string(&OutboundEnvelope {
        kind,
        payload,
        timestamp,
    })?;
    Ok(Frame::from(text))
}

/// Parse an inbound frame. A missing `payload` decodes to `null`.
pub fn decode(text: &str) -> Result<Envelope, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut fields) = value else {
        return Err(DecodeError::NotAnObject);
    };

    let kind = match fields.remove("type") {
        Some(Value::String(kind)) => kind,
        Some(_) => return Err(DecodeError::TypeNotString),
        None => return Err(DecodeError::MissingType),
    };
    let payload = fields.remove("payload").unwrap_or(Value::Null);

    Ok(Envelope { kind, payload })
}
