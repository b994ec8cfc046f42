//! Decoding of the backend's JSON response envelope.
//!
//! # Design
//! The backend wraps every reply in `{status, payload, redirect, code, error,
//! message}`. Fields are loosely typed on the wire (codes arrive as numbers
//! or strings, `redirect` is sometimes `true`), so the body is first read
//! into a permissive raw struct and then folded into a tagged `Envelope`.
//! Anything that does not look like an envelope at all becomes
//! `Envelope::Malformed` instead of being probed field by field later on.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::TIMEOUT_CODE;

/// Abort code some backends put in `code` when they gave up on a request.
const ABORTED_CODE: &str = "ECONNABORTED";

#[derive(Debug, Default, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    status: Option<Value>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    redirect: Option<Value>,
    #[serde(default)]
    code: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<Value>,
}

impl RawEnvelope {
    fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payload.is_none()
            && self.redirect.is_none()
            && self.code.is_none()
            && self.error.is_none()
            && self.message.is_none()
    }
}

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// `status == "ok"`.
    Success {
        /// `{}` when the backend sent no payload.
        payload: Value,
        /// Non-empty navigation target.
        redirect: Option<String>,
    },
    /// `status == "error"`, or no recognized status but an error code or
    /// identifier.
    Failure {
        code: Option<u16>,
        error: Option<String>,
        message: Option<String>,
    },
    /// The body is not an envelope.
    Malformed { reason: String },
}

impl Envelope {
    pub fn decode(body: &str) -> Envelope {
        let value: Value = match serde_json::from_str(body) {
            Ok(value) => value,
            Err(e) => {
                return Envelope::Malformed {
                    reason: format!("body is not json: {e}"),
                }
            }
        };
        if !value.is_object() {
            return Envelope::Malformed {
                reason: "body is not a json object".to_string(),
            };
        }
        let raw: RawEnvelope = match serde_json::from_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                return Envelope::Malformed {
                    reason: e.to_string(),
                }
            }
        };
        if raw.is_empty() {
            return Envelope::Malformed {
                reason: "no envelope fields".to_string(),
            };
        }

        let code = raw.code.as_ref().and_then(decode_code);
        let error = raw.error.as_ref().and_then(non_empty_string);
        let message = raw.message.as_ref().and_then(non_empty_string);
        match raw.status.as_ref().and_then(Value::as_str) {
            Some("ok") => Envelope::Success {
                payload: raw
                    .payload
                    .filter(|p| !p.is_null())
                    .unwrap_or_else(|| Value::Object(Map::new())),
                redirect: raw
                    .redirect
                    .as_ref()
                    .and_then(Value::as_str)
                    .filter(|target| !target.is_empty())
                    .map(str::to_string),
            },
            Some("error") => Envelope::Failure {
                code,
                error,
                message,
            },
            // Without a recognized status only an error code or identifier
            // makes the body a failure envelope.
            _ if code.is_some_and(|c| c != 0) || error.is_some() => Envelope::Failure {
                code,
                error,
                message,
            },
            _ => Envelope::Malformed {
                reason: "missing or unrecognized status".to_string(),
            },
        }
    }
}

fn decode_code(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) if s == ABORTED_CODE => Some(TIMEOUT_CODE),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn non_empty_string(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
