//! Command-driven upload backends.
//!
//! Each backend is an external program configured as an argument vector.
//! Placeholders in the arguments are filled from the upload options, the
//! program is run without a shell, and its stdout (a bare URL or a JSON
//! object) is rendered in the requested output format.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{info, warn};

use crate::format::{OutputFormat, UploadedPhoto};
use crate::process;
use crate::{ConnectorError, UploadOptions, UploadReceipt, Uploader};

const DEFAULT_BACKEND_TIMEOUT_SECS: u64 = 300;

fn default_timeout_secs() -> u64 {
    DEFAULT_BACKEND_TIMEOUT_SECS
}

/// `[backends.<name>]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackendCommand {
    pub command: Vec<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

pub struct CommandUploader {
    backends: BTreeMap<String, BackendCommand>,
}

impl CommandUploader {
    pub fn new(backends: BTreeMap<String, BackendCommand>) -> Self {
        let backends = backends
            .into_iter()
            .filter(|(name, backend)| {
                let usable = !backend.command.is_empty() && !backend.command[0].trim().is_empty();
                if !usable {
                    warn!(
                        component = "command_uploader",
                        event = "backend.config.empty_command",
                        backend = %name,
                        "Ignoring backend with an empty command"
                    );
                }
                usable
            })
            .collect();
        Self { backends }
    }

    async fn run_backend(
        &self,
        path: &Path,
        options: &UploadOptions,
    ) -> Result<UploadReceipt, ConnectorError> {
        let format: OutputFormat = options.format.parse()?;
        let backend = self
            .backends
            .get(&options.backend)
            .ok_or_else(|| ConnectorError::UnknownBackend(options.backend.clone()))?;

        let argv = expand_command(&backend.command, path, options);
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ConnectorError::UnknownBackend(options.backend.clone()))?;

        info!(
            component = "command_uploader",
            event = "backend.upload.started",
            backend = %options.backend,
            path = %path.display(),
            "Running backend command"
        );

        let output = process::run(
            OsStr::new(program),
            args,
            Duration::from_secs(backend.timeout_secs),
        )
        .await?
        .check(program)?;

        let photo = UploadedPhoto::parse(&output.stdout)?;
        let alt = if options.alt.is_empty() {
            &options.title
        } else {
            &options.alt
        };
        Ok(UploadReceipt {
            formatted_output: photo.render(format, alt),
        })
    }
}

impl Uploader for CommandUploader {
    fn available_backends(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }

    fn upload<'a>(
        &'a self,
        path: &'a Path,
        options: &'a UploadOptions,
    ) -> BoxFuture<'a, Result<UploadReceipt, ConnectorError>> {
        Box::pin(self.run_backend(path, options))
    }
}

/// Substitute `{path}`, `{name}`, `{title}`, `{description}`, `{tags}`
/// (comma separated) and `{alt}` in every argument.
pub fn expand_command(template: &[String], path: &Path, options: &UploadOptions) -> Vec<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let path_str = path.to_string_lossy();
    let tags = options.tags.join(",");

    template
        .iter()
        .map(|arg| {
            arg.replace("{path}", &path_str)
                .replace("{name}", &name)
                .replace("{title}", &options.title)
                .replace("{description}", &options.description)
                .replace("{tags}", &tags)
                .replace("{alt}", &options.alt)
        })
        .collect()
}
