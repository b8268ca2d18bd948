//! Core types shared across the protocol

use serde::{Deserialize, Serialize};

/// Caption data read from or written into an image file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl PhotoMetadata {
    /// True when there is nothing worth embedding.
    pub fn is_empty(&self) -> bool {
        self.title.trim().is_empty()
            && self.description.trim().is_empty()
            && self.tags.iter().all(|t| t.trim().is_empty())
    }
}

/// Metadata supplied by the caller with an `upload` request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub alt: String,
}

impl UploadMetadata {
    /// The caption portion (alt text is never embedded into the file).
    pub fn caption(&self) -> PhotoMetadata {
        PhotoMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            tags: self
                .tags
                .iter()
                .map(|t| t.trim())
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}

/// A file accepted by `prepare`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: String,
    pub name: String,
    pub size: u64,
    /// Unix seconds
    pub modified_time: u64,
}

/// Pipeline stage reported by a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Extracting,
    Uploading,
    Processing,
    Complete,
    Error,
    Cancelled,
}

impl ProgressStatus {
    /// Event command carrying this status.
    pub fn event_command(self) -> &'static str {
        match self {
            ProgressStatus::Error => "error",
            ProgressStatus::Cancelled => "cancelled",
            _ => "progress",
        }
    }
}

/// Error codes reported on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ParseError,
    UnknownCommand,
    InvalidRequest,
    SessionNotFound,
    NoBackends,
    UploadFailed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_use_screaming_snake_case() {
        let json = serde_json::to_string(&ErrorCode::SessionNotFound).unwrap();
        assert_eq!(json, "\"SESSION_NOT_FOUND\"");
        let parsed: ErrorCode = serde_json::from_str("\"NO_BACKENDS\"").unwrap();
        assert_eq!(parsed, ErrorCode::NoBackends);
    }

    #[test]
    fn caption_drops_blank_tags_and_alt() {
        let meta = UploadMetadata {
            title: "Harbor".into(),
            description: String::new(),
            tags: vec![" boats ".into(), "  ".into()],
            alt: "Boats at dusk".into(),
        };
        let caption = meta.caption();
        assert_eq!(caption.title, "Harbor");
        assert_eq!(caption.tags, vec!["boats"]);
        assert!(!caption.is_empty());
        assert!(PhotoMetadata::default().is_empty());
    }

    #[test]
    fn status_maps_to_event_command() {
        assert_eq!(ProgressStatus::Extracting.event_command(), "progress");
        assert_eq!(ProgressStatus::Complete.event_command(), "progress");
        assert_eq!(ProgressStatus::Error.event_command(), "error");
        assert_eq!(ProgressStatus::Cancelled.event_command(), "cancelled");
    }
}
