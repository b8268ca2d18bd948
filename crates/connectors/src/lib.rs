//! photobridge connectors
//!
//! Collaborators driven by the engine: the image metadata tool and the
//! upload backends. Each is reached through a trait so the engine can run
//! against fakes in tests.

pub mod command;
pub mod exiftool;
pub mod format;
pub mod process;

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use photobridge_protocol::PhotoMetadata;
use tempfile::TempDir;
use thiserror::Error;

pub use command::{BackendCommand, CommandUploader};
pub use exiftool::ExifTool;
pub use format::{OutputFormat, UploadedPhoto};

/// Errors that can occur in connectors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Failed to spawn {program}: {source}")]
    SpawnError {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process communication error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("{program} timed out after {secs}s")]
    Timeout { program: String, secs: u64 },

    #[error("{program} exited with status {code:?}: {stderr}")]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Metadata tool is not available")]
    ToolUnavailable,

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

/// Reads and writes caption metadata inside image files.
pub trait MetadataTool: Send + Sync {
    fn is_available(&self) -> bool;

    fn extract<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<PhotoMetadata, ConnectorError>>;

    /// Write `metadata` into a temporary copy of `path`.
    fn embed<'a>(
        &'a self,
        path: &'a Path,
        metadata: &'a PhotoMetadata,
    ) -> BoxFuture<'a, Result<EmbeddedCopy, ConnectorError>>;
}

/// Sends files to image-hosting backends.
pub trait Uploader: Send + Sync {
    /// Names of the configured backends, sorted.
    fn available_backends(&self) -> Vec<String>;

    fn upload<'a>(
        &'a self,
        path: &'a Path,
        options: &'a UploadOptions,
    ) -> BoxFuture<'a, Result<UploadReceipt, ConnectorError>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadOptions {
    pub backend: String,
    pub format: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub alt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub formatted_output: String,
}

/// A metadata-embedded copy living in its own temporary directory.
/// Dropping it deletes the directory and the copy.
#[derive(Debug)]
pub struct EmbeddedCopy {
    path: PathBuf,
    _dir: TempDir,
}

impl EmbeddedCopy {
    pub fn new(dir: TempDir, path: PathBuf) -> Self {
        Self { path, _dir: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_copy_removes_directory_on_drop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let dir_path = dir.path().to_path_buf();
        let file = dir_path.join("a.jpg");
        std::fs::write(&file, b"jpeg").expect("write");

        let copy = EmbeddedCopy::new(dir, file.clone());
        assert_eq!(copy.path(), file.as_path());
        assert!(file.exists());

        drop(copy);
        assert!(!file.exists());
        assert!(!dir_path.exists());
    }
}
