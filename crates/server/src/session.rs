//! Session state owned by the registry

use std::path::PathBuf;
use std::time::Instant;

use photobridge_protocol::PhotoMetadata;
use tokio_util::sync::CancellationToken;

/// Lifecycle of one prepare → upload session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Uploading,
    Cancelled,
    Completed,
}

/// Server-side record for one session. Callers only ever see clones;
/// mutation goes through `SessionRegistry`.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub files: Vec<PathBuf>,
    pub metadata: PhotoMetadata,
    pub cancel: Option<CancellationToken>,
    pub state: SessionState,
    pub created_at: Instant,
}

impl Session {
    pub fn new(id: String, files: Vec<PathBuf>, metadata: PhotoMetadata) -> Self {
        Self {
            id,
            files,
            metadata,
            cancel: None,
            state: SessionState::Created,
            created_at: Instant::now(),
        }
    }
}
