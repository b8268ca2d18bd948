//! Fake collaborators shared by the engine and orchestrator tests.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use photobridge_connectors::{
    ConnectorError, EmbeddedCopy, MetadataTool, UploadOptions, UploadReceipt, Uploader,
};
use photobridge_protocol::PhotoMetadata;
use tokio::sync::Notify;

/// Embeds by copying the file into a fresh temp dir, or fails every embed
/// when `fail_embed` is set.
#[derive(Default)]
pub struct FakeMetadata {
    pub available: bool,
    pub fail_embed: bool,
    pub extracted: PhotoMetadata,
    pub embedded: Mutex<Vec<PathBuf>>,
}

impl MetadataTool for FakeMetadata {
    fn is_available(&self) -> bool {
        self.available
    }

    fn extract<'a>(
        &'a self,
        _path: &'a Path,
    ) -> BoxFuture<'a, Result<PhotoMetadata, ConnectorError>> {
        Box::pin(async move { Ok(self.extracted.clone()) })
    }

    fn embed<'a>(
        &'a self,
        path: &'a Path,
        _metadata: &'a PhotoMetadata,
    ) -> BoxFuture<'a, Result<EmbeddedCopy, ConnectorError>> {
        Box::pin(async move {
            if self.fail_embed {
                return Err(ConnectorError::ProcessFailed {
                    program: "exiftool".into(),
                    code: Some(1),
                    stderr: "unsupported file type".into(),
                });
            }
            let dir = tempfile::Builder::new()
                .prefix("photobridge-test-")
                .tempdir()?;
            let dest = dir.path().join(path.file_name().unwrap_or_default());
            std::fs::copy(path, &dest)?;
            self.embedded.lock().unwrap().push(dest.clone());
            Ok(EmbeddedCopy::new(dir, dest))
        })
    }
}

/// Uploads succeed unless the file name contains "fail". With a gate,
/// every upload signals `started` and then waits to be released.
#[derive(Default)]
pub struct FakeUploader {
    pub backends: Vec<String>,
    pub gate: Option<Arc<Notify>>,
    pub started: Arc<Notify>,
    pub uploaded: Mutex<Vec<(PathBuf, UploadOptions)>>,
}

impl FakeUploader {
    pub fn with_backends(names: &[&str]) -> Self {
        Self {
            backends: names.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn gated(names: &[&str]) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let uploader = Self {
            gate: Some(gate.clone()),
            ..Self::with_backends(names)
        };
        (uploader, gate)
    }
}

impl Uploader for FakeUploader {
    fn available_backends(&self) -> Vec<String> {
        self.backends.clone()
    }

    fn upload<'a>(
        &'a self,
        path: &'a Path,
        options: &'a UploadOptions,
    ) -> BoxFuture<'a, Result<UploadReceipt, ConnectorError>> {
        Box::pin(async move {
            self.uploaded
                .lock()
                .unwrap()
                .push((path.to_path_buf(), options.clone()));
            if let Some(gate) = &self.gate {
                self.started.notify_one();
                gate.notified().await;
            }
            let name = path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .into_owned();
            if name.contains("fail") {
                return Err(ConnectorError::BackendError(format!("{name} rejected")));
            }
            Ok(UploadReceipt {
                formatted_output: format!("https://img.example/{name}"),
            })
        })
    }
}
