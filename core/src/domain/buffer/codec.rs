//! Buffer payload codec
//!
//! Encodes a span plus its tenant scope into one self-contained payload so
//! the flush worker can persist any mix of projects from one batch. The
//! wire form is JSON; organization and project ids travel hex-encoded.
//!
//! Downstream text stores reject NUL bytes, so NUL characters inside span
//! strings are scrubbed out of the payload before buffering.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::types::Span;

// ============================================================================
// ERROR TYPE
// ============================================================================

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode payload: {0}")]
    Encode(String),
    #[error("Failed to decode payload: {0}")]
    Decode(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

// ============================================================================
// ENVELOPE
// ============================================================================

/// Wire form of one buffered span with its tenant scope
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    organization_id: String,
    project_id: String,
    span: Span,
}

/// Encode a span with its tenant scope into a buffer payload
pub fn encode(
    organization_id: &str,
    project_id: &str,
    span: &Span,
) -> Result<Vec<u8>, CodecError> {
    let envelope = Envelope {
        organization_id: hex::encode(organization_id.as_bytes()),
        project_id: hex::encode(project_id.as_bytes()),
        span: span.clone(),
    };
    let mut value =
        serde_json::to_value(&envelope).map_err(|e| CodecError::Encode(e.to_string()))?;
    if scrub_nul(&mut value) {
        tracing::warn!(
            trace_id = %span.trace_id,
            span_id = %span.span_id,
            "Payload contains NUL characters, scrubbing"
        );
    }
    serde_json::to_vec(&value).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Remove NUL characters from every string in the value, map keys included.
/// Returns true when anything was removed. Operates on characters, not on
/// the encoded text, so string fields that merely spell out an escape
/// sequence pass through untouched.
fn scrub_nul(value: &mut serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::String(s) if s.contains('\0') => {
            s.retain(|c| c != '\0');
            true
        }
        Value::Array(items) => {
            let mut found = false;
            for item in items {
                found |= scrub_nul(item);
            }
            found
        }
        Value::Object(map) => {
            let mut found = false;
            for (_, item) in map.iter_mut() {
                found |= scrub_nul(item);
            }
            if map.keys().any(|k| k.contains('\0')) {
                *map = std::mem::take(map)
                    .into_iter()
                    .map(|(k, v)| (k.replace('\0', ""), v))
                    .collect();
                found = true;
            }
            found
        }
        _ => false,
    }
}

/// Decode a buffer payload back into (organization_id, project_id, span)
pub fn decode(payload: &[u8]) -> Result<(String, String, Span), CodecError> {
    let envelope: Envelope =
        serde_json::from_slice(payload).map_err(|e| CodecError::Decode(e.to_string()))?;

    let organization_id = decode_id(&envelope.organization_id)?;
    let project_id = decode_id(&envelope.project_id)?;
    Ok((organization_id, project_id, envelope.span))
}

fn decode_id(encoded: &str) -> Result<String, CodecError> {
    let bytes =
        hex::decode(encoded).map_err(|e| CodecError::InvalidIdentifier(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| CodecError::InvalidIdentifier(e.to_string()))
}
