//! Command dispatcher
//!
//! Decodes each request envelope into its typed request and routes it.
//! `prepare` and `cancel` are answered inline; `upload` is validated inline
//! and then handed to an orchestrator task so the read loop keeps going.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use photobridge_connectors::{MetadataTool, UploadOptions, Uploader};
use photobridge_protocol::{
    CancelRequest, CancelResponse, CodecError, Envelope, EnvelopeKind, ErrorCode, FileInfo,
    PhotoMetadata, PrepareRequest, PrepareResponse, Request, RequestError, UploadRequest,
};

use crate::orchestrator::{Orchestrator, UploadJob};
use crate::output::Outbound;
use crate::session::SessionState;
use crate::state::{RegistryError, SessionRegistry};

const NO_BACKENDS_MESSAGE: &str = "no upload backends are configured";

pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    metadata: Arc<dyn MetadataTool>,
    uploader: Arc<dyn Uploader>,
    outbound: Outbound,
    tasks: TaskTracker,
}

impl Dispatcher {
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
            tasks: TaskTracker::new(),
        }
    }

    pub async fn dispatch(&self, envelope: Envelope) {
        let correlation_id = envelope.correlation_id;
        debug!(
            component = "dispatch",
            event = "dispatch.request.received",
            correlation_id = %correlation_id,
            command = %envelope.command,
            "Received envelope"
        );

        if envelope.kind != EnvelopeKind::Request {
            self.outbound
                .respond_error(
                    &correlation_id,
                    ErrorCode::InvalidRequest,
                    format!("expected a request envelope, got {:?}", envelope.kind),
                )
                .await;
            return;
        }

        let request = match Request::decode(&envelope.command, envelope.payload) {
            Ok(request) => request,
            Err(RequestError::UnknownCommand(command)) => {
                warn!(
                    component = "dispatch",
                    event = "dispatch.request.unknown_command",
                    correlation_id = %correlation_id,
                    command = %command,
                    "Unknown command"
                );
                self.outbound
                    .respond_error(
                        &correlation_id,
                        ErrorCode::UnknownCommand,
                        format!("unknown command: {command}"),
                    )
                    .await;
                return;
            }
            Err(e @ RequestError::InvalidPayload { .. }) => {
                self.outbound
                    .respond_error(&correlation_id, ErrorCode::InvalidRequest, e.to_string())
                    .await;
                return;
            }
        };

        match request {
            Request::Prepare(req) => self.handle_prepare(&correlation_id, req).await,
            Request::Upload(req) => self.handle_upload(correlation_id, req).await,
            Request::Cancel(req) => self.handle_cancel(&correlation_id, req).await,
        }
    }

    /// Answer an envelope the codec could not decode.
    pub async fn report_decode_error(&self, error: &CodecError) {
        let correlation_id = error.correlation_id().unwrap_or_default();
        warn!(
            component = "dispatch",
            event = "dispatch.request.parse_failed",
            correlation_id = %correlation_id,
            error = %error,
            "Failed to decode envelope"
        );
        self.outbound
            .respond_error(correlation_id, ErrorCode::ParseError, error.to_string())
            .await;
    }

    /// Stop accepting uploads and wait for the running ones to finish.
    pub async fn shutdown(self) {
        self.tasks.close();
        if !self.tasks.is_empty() {
            info!(
                component = "dispatch",
                event = "dispatch.shutdown.waiting",
                uploads = self.tasks.len(),
                "Waiting for in-flight uploads"
            );
        }
        self.tasks.wait().await;
    }

    async fn handle_prepare(&self, correlation_id: &str, req: PrepareRequest) {
        let mut files = Vec::with_capacity(req.files.len());
        let mut paths = Vec::with_capacity(req.files.len());
        for raw in &req.files {
            if let Some(info) = describe_file(raw).await {
                paths.push(PathBuf::from(raw));
                files.push(info);
            }
        }

        let metadata = match paths.first() {
            Some(first) => self.extract_metadata(first).await,
            None => PhotoMetadata::default(),
        };

        let session_id = self.registry.create(paths, metadata.clone());
        info!(
            component = "dispatch",
            event = "session.prepared",
            session_id = %session_id,
            requested = req.files.len(),
            accepted = files.len(),
            "Session prepared"
        );

        let response = PrepareResponse {
            session_id,
            files,
            metadata,
            backends: self.uploader.available_backends(),
        };
        self.outbound.respond(correlation_id, &response).await;
    }

    async fn extract_metadata(&self, path: &Path) -> PhotoMetadata {
        if !self.metadata.is_available() {
            return PhotoMetadata::default();
        }
        match self.metadata.extract(path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(
                    component = "dispatch",
                    event = "prepare.extract.failed",
                    path = %path.display(),
                    error = %e,
                    "Metadata extraction failed, using empty metadata"
                );
                PhotoMetadata::default()
            }
        }
    }

    async fn handle_upload(&self, correlation_id: String, req: UploadRequest) {
        let session = match self.registry.get(&req.session_id) {
            Ok(session) => session,
            Err(e) => {
                self.outbound
                    .respond_error(&correlation_id, ErrorCode::SessionNotFound, e.to_string())
                    .await;
                return;
            }
        };

        if session.state != SessionState::Created {
            let e = RegistryError::NotUploadable {
                id: session.id.clone(),
                state: session.state,
            };
            self.outbound
                .respond_error(&correlation_id, ErrorCode::InvalidRequest, e.to_string())
                .await;
            return;
        }

        let backends = self.uploader.available_backends();
        let backend = if backends.is_empty() {
            self.outbound
                .respond_error(&correlation_id, ErrorCode::NoBackends, NO_BACKENDS_MESSAGE)
                .await;
            return;
        } else if req.backend.trim().is_empty() {
            backends[0].clone()
        } else if !backends.contains(&req.backend) {
            self.outbound
                .respond_error(
                    &correlation_id,
                    ErrorCode::InvalidRequest,
                    format!("unknown backend: {}", req.backend),
                )
                .await;
            return;
        } else {
            req.backend.clone()
        };

        let cancel = CancellationToken::new();
        if let Err(e) = self.registry.attach_cancel(&req.session_id, cancel.clone()) {
            let code = match e {
                RegistryError::NotFound(_) => ErrorCode::SessionNotFound,
                RegistryError::NotUploadable { .. } => ErrorCode::InvalidRequest,
            };
            self.outbound.respond_error(&correlation_id, code, e.to_string()).await;
            return;
        }

        // With no caption supplied, backends still see what prepare read from the file.
        let caption = req.metadata.caption();
        let label = if caption.is_empty() { &session.metadata } else { &caption };
        let options = UploadOptions {
            backend,
            format: req.format,
            title: label.title.clone(),
            description: label.description.clone(),
            tags: label.tags.clone(),
            alt: req.metadata.alt,
        };
        let job = UploadJob {
            session_id: req.session_id,
            correlation_id,
            files: session.files,
            caption,
            options,
        };

        let orchestrator = Orchestrator::new(
            self.registry.clone(),
            self.metadata.clone(),
            self.uploader.clone(),
            self.outbound.clone(),
        );
        self.tasks.spawn(orchestrator.run(job, cancel));
    }

    async fn handle_cancel(&self, correlation_id: &str, req: CancelRequest) {
        match self.registry.cancel(&req.session_id) {
            Ok(()) => {
                let response = CancelResponse {
                    session_id: req.session_id,
                    cancelled: true,
                };
                self.outbound.respond(correlation_id, &response).await;
            }
            Err(e) => {
                self.outbound
                    .respond_error(correlation_id, ErrorCode::SessionNotFound, e.to_string())
                    .await;
            }
        }
    }
}

/// Stat a requested path. Unreadable paths and non-files are omitted.
async fn describe_file(raw: &str) -> Option<FileInfo> {
    let path = Path::new(raw);
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => meta,
        Ok(_) => {
            warn!(
                component = "dispatch",
                event = "prepare.file.not_a_file",
                path = %raw,
                "Skipping path that is not a regular file"
            );
            return None;
        }
        Err(e) => {
            warn!(
                component = "dispatch",
                event = "prepare.file.stat_failed",
                path = %raw,
                error = %e,
                "Skipping unreadable file"
            );
            return None;
        }
    };

    let modified_time = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    Some(FileInfo {
        path: raw.to_string(),
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| raw.to_string()),
        size: meta.len(),
        modified_time,
    })
}
