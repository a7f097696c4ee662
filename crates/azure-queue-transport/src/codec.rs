//! Wire encodings between [`Message`] and queue message text.
//!
//! Queue message text must be XML-safe, so both encodings end in base64:
//!
//! - [`WireFormat::Envelope`]: a versioned JSON envelope holding body and
//!   headers. Only this transport is expected to read it.
//! - [`WireFormat::BodyOnly`]: the body itself (a JSON object) with headers
//!   folded in under [`HEADERS_KEY`], so other consumers of the queue can
//!   read the payload after a plain base64 decode.

use crate::error::DecodingError;
use crate::message::{Headers, Message};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;

/// Reserved key carrying headers inside a body-only payload
pub const HEADERS_KEY: &str = "__headers";

/// Current envelope schema version
pub const ENVELOPE_VERSION: u32 = 1;

/// Encoding applied to messages before they reach the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Versioned `{version, body, headers}` envelope
    #[default]
    Envelope,
    /// JSON body with headers under `__headers`
    BodyOnly,
}

impl WireFormat {
    /// Select the format from the `body_only` option
    pub fn from_body_only(body_only: bool) -> Self {
        if body_only {
            Self::BodyOnly
        } else {
            Self::Envelope
        }
    }

    /// Encode a message into queue text
    pub fn encode(&self, message: &Message) -> Result<String, DecodingError> {
        let json = match self {
            Self::Envelope => serde_json::to_vec(&EnvelopeRef {
                version: ENVELOPE_VERSION,
                body: &message.body,
                headers: &message.headers,
            })?,
            Self::BodyOnly => encode_body_only(message)?,
        };

        Ok(STANDARD.encode(json))
    }

    /// Decode queue text back into a message without a receipt
    pub fn decode(&self, text: &str) -> Result<Message, DecodingError> {
        let raw = String::from_utf8(STANDARD.decode(text.trim())?)?;

        match self {
            Self::Envelope => {
                let envelope: Envelope = serde_json::from_str(&raw)?;
                if envelope.version != ENVELOPE_VERSION {
                    return Err(DecodingError::UnsupportedEnvelopeVersion {
                        version: envelope.version,
                    });
                }
                Ok(Message::with_parts(envelope.body, envelope.headers))
            }
            Self::BodyOnly => decode_body_only(&raw),
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    body: &'a str,
    headers: &'a Headers,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    body: String,
    #[serde(default)]
    headers: Headers,
}

fn encode_body_only(message: &Message) -> Result<Vec<u8>, DecodingError> {
    let mut object = match serde_json::from_str::<Value>(&message.body)? {
        Value::Object(object) => object,
        _ => return Err(DecodingError::BodyNotObject),
    };

    // Headers always win over a stale carrier left in the body
    let headers: Map<String, Value> = message
        .headers
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    object.insert(HEADERS_KEY.to_string(), Value::Object(headers));

    Ok(serde_json::to_vec(&Value::Object(object))?)
}

fn decode_body_only(raw: &str) -> Result<Message, DecodingError> {
    let mut object = match serde_json::from_str::<Value>(raw)? {
        Value::Object(object) => object,
        _ => return Err(DecodingError::BodyNotObject),
    };

    let headers = match object.shift_remove(HEADERS_KEY) {
        None => Headers::new(),
        Some(Value::Object(map)) => map.into_iter().collect(),
        Some(_) => return Err(DecodingError::InvalidHeaders { key: HEADERS_KEY }),
    };

    let body = serde_json::to_string(&Value::Object(object))?;
    Ok(Message::with_parts(body, headers))
}
