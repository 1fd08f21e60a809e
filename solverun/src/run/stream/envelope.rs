//! Envelope decoding for push-channel frames.
//!
//! Each frame's data is a JSON envelope `{type, payload, timestamp}`. The
//! envelope's `type` is authoritative; the frame's `event:` name is only used
//! when the envelope omits it.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::frame::Frame;
use crate::run::error::EnvelopeError;
use crate::run::types::{EventKind, SolveResult, StreamEvent, StreamPayload};

/// SSE default event name; carries no type information.
const DEFAULT_EVENT_NAME: &str = "message";

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    timestamp: Value,
}

/// Decodes a frame into a typed [`StreamEvent`].
pub fn decode_frame(frame: &Frame) -> Result<StreamEvent, EnvelopeError> {
    let envelope: RawEnvelope = serde_json::from_str(&frame.data)
        .map_err(|e| EnvelopeError::InvalidJson(e.to_string()))?;

    let type_name = envelope
        .kind
        .as_deref()
        .or(frame.event.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != DEFAULT_EVENT_NAME)
        .ok_or(EnvelopeError::MissingType)?;

    let kind: EventKind = type_name
        .parse()
        .map_err(|_| EnvelopeError::UnknownType(type_name.to_string()))?;

    let payload = if kind.carries_result() {
        let result: SolveResult =
            serde_json::from_value(envelope.payload).map_err(|e| EnvelopeError::InvalidPayload {
                kind: kind.to_string(),
                reason: e.to_string(),
            })?;
        StreamPayload::Result(result)
    } else {
        StreamPayload::Metadata(envelope.payload)
    };

    Ok(StreamEvent {
        kind,
        payload,
        received_at: parse_timestamp(&envelope.timestamp).unwrap_or_else(Utc::now),
    })
}

/// Accepts RFC 3339 strings or epoch milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
        _ => None,
    }
}
