//! Client → engine requests

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::codec::CodecError;
use crate::envelope::Envelope;
use crate::types::UploadMetadata;

pub const PREPARE: &str = "prepare";
pub const UPLOAD: &str = "upload";
pub const CANCEL: &str = "cancel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareRequest {
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub session_id: String,
    #[serde(default)]
    pub metadata: UploadMetadata,
    /// Empty selects the first available backend.
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub session_id: String,
}

/// A request decoded from its envelope, one variant per command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Prepare(PrepareRequest),
    Upload(UploadRequest),
    Cancel(CancelRequest),
}

#[derive(Debug, Error)]
pub enum RequestError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid {command} payload: {source}")]
    InvalidPayload {
        command: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl Request {
    /// Decode a payload for `command`. The command tag picks the concrete
    /// type and the payload is deserialized straight into it.
    pub fn decode(command: &str, payload: Value) -> Result<Self, RequestError> {
        match command {
            PREPARE => decode_payload(PREPARE, payload).map(Request::Prepare),
            UPLOAD => decode_payload(UPLOAD, payload).map(Request::Upload),
            CANCEL => decode_payload(CANCEL, payload).map(Request::Cancel),
            other => Err(RequestError::UnknownCommand(other.to_string())),
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Request::Prepare(_) => PREPARE,
            Request::Upload(_) => UPLOAD,
            Request::Cancel(_) => CANCEL,
        }
    }

    /// Wrap into a request envelope (used by clients and tests).
    pub fn into_envelope(self, correlation_id: impl Into<String>) -> Result<Envelope, CodecError> {
        let command = self.command();
        let payload = match self {
            Request::Prepare(req) => serde_json::to_value(req),
            Request::Upload(req) => serde_json::to_value(req),
            Request::Cancel(req) => serde_json::to_value(req),
        }
        .map_err(CodecError::Encode)?;
        Ok(Envelope::request(command, correlation_id, payload))
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(
    command: &'static str,
    payload: Value,
) -> Result<T, RequestError> {
    serde_json::from_value(payload)
        .map_err(|source| RequestError::InvalidPayload { command, source })
}
