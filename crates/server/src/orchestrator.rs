//! Upload orchestrator, one task per accepted `upload` request.
//!
//! Drives each file through extract, embed and upload, emitting progress
//! events as it goes. A failed file is reported and skipped; the batch
//! always continues. Cancellation is cooperative: the token is checked
//! before each file starts and once more before the final response, never
//! in the middle of a backend upload.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use photobridge_connectors::{EmbeddedCopy, MetadataTool, UploadOptions, Uploader};
use photobridge_protocol::{
    ErrorCode, PhotoMetadata, ProgressEvent, ProgressStatus, UploadOutcome,
};

use crate::output::Outbound;
use crate::session::SessionState;
use crate::state::SessionRegistry;

const EXTRACTING_PERCENT: u8 = 10;
const EMBEDDING_PERCENT: u8 = 20;
const UPLOADING_PERCENT: u8 = 30;
const COMPLETE_PERCENT: u8 = 100;

/// Everything one upload task needs, captured when the request is accepted.
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub session_id: String,
    pub correlation_id: String,
    pub files: Vec<PathBuf>,
    /// Caption data to embed; empty means upload the originals untouched.
    pub caption: PhotoMetadata,
    pub options: UploadOptions,
}

#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<SessionRegistry>,
    metadata: Arc<dyn MetadataTool>,
    uploader: Arc<dyn Uploader>,
    outbound: Outbound,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<SessionRegistry>,
        metadata: Arc<dyn MetadataTool>,
        uploader: Arc<dyn Uploader>,
        outbound: Outbound,
    ) -> Self {
        Self {
            registry,
            metadata,
            uploader,
            outbound,
        }
    }

    pub async fn run(self, job: UploadJob, cancel: CancellationToken) {
        info!(
            component = "orchestrator",
            event = "upload.started",
            session_id = %job.session_id,
            backend = %job.options.backend,
            files = job.files.len(),
            "Upload started"
        );

        let mut outputs = Vec::new();
        let mut failures = 0usize;

        for (index, path) in job.files.iter().enumerate() {
            if cancel.is_cancelled() {
                self.finish_cancelled(&job, index, &file_name(path)).await;
                return;
            }

            match self.upload_file(&job, index, path).await {
                Some(output) => outputs.push(output),
                None => failures += 1,
            }
        }

        if cancel.is_cancelled() {
            self.finish_cancelled(&job, job.files.len(), "").await;
            return;
        }

        match self.registry.complete(&job.session_id) {
            // Cancelled after the last checkpoint; the client already saw cancelled: true.
            Ok(SessionState::Cancelled) => {
                self.finish_cancelled(&job, job.files.len(), "").await;
                return;
            }
            Ok(_) => {}
            Err(e) => debug!(
                component = "orchestrator",
                event = "upload.complete.session_missing",
                session_id = %job.session_id,
                error = %e,
                "Session vanished before completion"
            ),
        }

        let outcome = UploadOutcome {
            session_id: job.session_id.clone(),
            success: failures == 0,
            outputs,
            files: job
                .files
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        };
        self.outbound.respond(&job.correlation_id, &outcome).await;

        if let Err(e) = self.registry.remove(&job.session_id) {
            debug!(
                component = "orchestrator",
                event = "upload.remove.session_missing",
                session_id = %job.session_id,
                error = %e,
                "Session already removed"
            );
        }
        info!(
            component = "orchestrator",
            event = "upload.finished",
            session_id = %job.session_id,
            uploaded = outcome.outputs.len(),
            failed = failures,
            "Upload finished"
        );
    }

    /// Run one file through the pipeline. Returns the formatted output on
    /// success; failures are reported as an `error` event.
    async fn upload_file(&self, job: &UploadJob, index: usize, path: &Path) -> Option<String> {
        let name = file_name(path);
        self.emit(
            job,
            index,
            &name,
            EXTRACTING_PERCENT,
            ProgressStatus::Extracting,
            "Preparing file",
        )
        .await;

        // Held until the upload below returns; dropping it removes the copy.
        let embedded = self.embed_caption(job, index, &name, path).await;
        let upload_path = embedded.as_ref().map(EmbeddedCopy::path).unwrap_or(path);

        self.emit(
            job,
            index,
            &name,
            UPLOADING_PERCENT,
            ProgressStatus::Uploading,
            &format!("Uploading to {}", job.options.backend),
        )
        .await;

        let result = self.uploader.upload(upload_path, &job.options).await;
        drop(embedded);

        match result {
            Ok(receipt) => {
                self.emit(
                    job,
                    index,
                    &name,
                    COMPLETE_PERCENT,
                    ProgressStatus::Complete,
                    "Upload complete",
                )
                .await;
                Some(receipt.formatted_output)
            }
            Err(e) => {
                warn!(
                    component = "orchestrator",
                    event = "upload.file.failed",
                    session_id = %job.session_id,
                    file_index = index,
                    path = %path.display(),
                    error = %e,
                    "File upload failed, continuing with the rest of the batch"
                );
                self.outbound
                    .progress(&ProgressEvent {
                        session_id: job.session_id.clone(),
                        file_index: index,
                        file_name: name,
                        progress_percent: UPLOADING_PERCENT,
                        status: ProgressStatus::Error,
                        message: e.to_string(),
                        error_code: Some(ErrorCode::UploadFailed),
                    })
                    .await;
                None
            }
        }
    }

    /// Best-effort: any failure falls back to the original file.
    async fn embed_caption(
        &self,
        job: &UploadJob,
        index: usize,
        name: &str,
        path: &Path,
    ) -> Option<EmbeddedCopy> {
        if job.caption.is_empty() || !self.metadata.is_available() {
            return None;
        }

        self.emit(
            job,
            index,
            name,
            EMBEDDING_PERCENT,
            ProgressStatus::Processing,
            "Embedding metadata",
        )
        .await;

        match self.metadata.embed(path, &job.caption).await {
            Ok(copy) => Some(copy),
            Err(e) => {
                warn!(
                    component = "orchestrator",
                    event = "upload.embed.failed",
                    session_id = %job.session_id,
                    path = %path.display(),
                    error = %e,
                    "Metadata embedding failed, uploading original file"
                );
                None
            }
        }
    }

    async fn finish_cancelled(&self, job: &UploadJob, index: usize, name: &str) {
        info!(
            component = "orchestrator",
            event = "upload.cancelled",
            session_id = %job.session_id,
            next_file_index = index,
            "Upload cancelled"
        );
        self.emit(job, index, name, 0, ProgressStatus::Cancelled, "Upload cancelled")
            .await;
    }

    async fn emit(
        &self,
        job: &UploadJob,
        index: usize,
        name: &str,
        percent: u8,
        status: ProgressStatus,
        message: &str,
    ) {
        self.outbound
            .progress(&ProgressEvent {
                session_id: job.session_id.clone(),
                file_index: index,
                file_name: name.to_string(),
                progress_percent: percent,
                status,
                message: message.to_string(),
                error_code: None,
            })
            .await;
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}
