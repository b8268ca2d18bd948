//! Engine → client responses and events

use serde::{Deserialize, Serialize};

use crate::types::{ErrorCode, FileInfo, PhotoMetadata, ProgressStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareResponse {
    pub session_id: String,
    pub files: Vec<FileInfo>,
    pub metadata: PhotoMetadata,
    pub backends: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub session_id: String,
    pub cancelled: bool,
}

/// Final response to an `upload` request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub session_id: String,
    /// False when any file failed to upload.
    pub success: bool,
    /// One entry per uploaded file, in file order.
    pub outputs: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub session_id: String,
    pub file_index: usize,
    pub file_name: String,
    pub progress_percent: u8,
    pub status: ProgressStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: ErrorCode,
    pub message: String,
}
