//! The envelope wrapping every message on the wire

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::codec::CodecError;
use crate::response::ErrorPayload;
use crate::types::ErrorCode;

/// Envelope kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Request,
    Response,
    Event,
}

/// One message unit on the wire.
///
/// Requests and events carry a `command`; responses leave it empty.
/// Responses echo the request's `correlationId`; events carry none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub kind: EnvelopeKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub command: String,
    #[serde(default)]
    pub payload: Value,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub correlation_id: String,
}

impl Envelope {
    pub fn request(
        command: impl Into<String>,
        correlation_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            kind: EnvelopeKind::Request,
            command: command.into(),
            payload,
            correlation_id: correlation_id.into(),
        }
    }

    /// Successful response carrying `body` as its payload.
    pub fn response<T: Serialize>(
        correlation_id: impl Into<String>,
        body: &T,
    ) -> Result<Self, CodecError> {
        let payload = serde_json::to_value(body).map_err(CodecError::Encode)?;
        Ok(Self {
            kind: EnvelopeKind::Response,
            command: String::new(),
            payload,
            correlation_id: correlation_id.into(),
        })
    }

    /// Error response: `{"error": {"code": ..., "message": ...}}`.
    pub fn error(
        correlation_id: impl Into<String>,
        code: ErrorCode,
        message: impl Into<String>,
    ) -> Self {
        let error = ErrorPayload {
            code,
            message: message.into(),
        };
        Self {
            kind: EnvelopeKind::Response,
            command: String::new(),
            payload: json!({ "error": error }),
            correlation_id: correlation_id.into(),
        }
    }

    /// Unsolicited event.
    pub fn event<T: Serialize>(command: impl Into<String>, body: &T) -> Result<Self, CodecError> {
        let payload = serde_json::to_value(body).map_err(CodecError::Encode)?;
        Ok(Self {
            kind: EnvelopeKind::Event,
            command: command.into(),
            payload,
            correlation_id: String::new(),
        })
    }

    /// The error carried by an error response, if any.
    pub fn error_payload(&self) -> Option<ErrorPayload> {
        if self.kind != EnvelopeKind::Response {
            return None;
        }
        self.payload
            .get("error")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
