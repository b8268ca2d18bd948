//! photobridge protocol
//!
//! Wire types for the session protocol engine. Every message is an
//! [`Envelope`] serialized as one line of JSON on stdin/stdout.

use uuid::Uuid;

pub mod codec;
pub mod envelope;
pub mod request;
pub mod response;
pub mod types;

pub use codec::{encode, CodecError, EnvelopeReader, DEFAULT_MAX_LINE_BYTES};
pub use envelope::{Envelope, EnvelopeKind};
pub use request::{CancelRequest, PrepareRequest, Request, RequestError, UploadRequest};
pub use response::{CancelResponse, ErrorPayload, PrepareResponse, ProgressEvent, UploadOutcome};
pub use types::*;

/// Generate a new session identifier (128-bit random).
pub fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}
