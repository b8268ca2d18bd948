//! ExifTool connector
//!
//! Reads caption metadata with `exiftool -j` and writes metadata-embedded
//! copies with `exiftool -o`. The binary is optional: without it extraction
//! yields empty metadata and embedding reports `ToolUnavailable`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::BoxFuture;
use photobridge_protocol::PhotoMetadata;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::process;
use crate::{ConnectorError, EmbeddedCopy, MetadataTool};

const EXIFTOOL_ENV: &str = "PHOTOBRIDGE_EXIFTOOL";

const TITLE_TAGS: &[&str] = &["Title", "ObjectName"];
const DESCRIPTION_TAGS: &[&str] = &["Description", "ImageDescription", "Caption-Abstract"];
const KEYWORD_TAGS: &[&str] = &["Keywords", "Subject"];

pub struct ExifTool {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl ExifTool {
    pub fn new(binary: Option<PathBuf>, timeout: Duration) -> Self {
        Self { binary, timeout }
    }

    /// Locate the binary: configured path, then `PHOTOBRIDGE_EXIFTOOL`, then `PATH`.
    pub fn discover(configured: Option<&Path>, timeout: Duration) -> Self {
        let binary = resolve_exiftool_binary(configured);
        match &binary {
            Some(path) => info!(
                component = "exiftool",
                event = "exiftool.binary.resolved",
                path = %path.display(),
                "Using exiftool"
            ),
            None => warn!(
                component = "exiftool",
                event = "exiftool.binary.not_found",
                "exiftool not found; metadata extraction and embedding are disabled"
            ),
        }
        Self::new(binary, timeout)
    }

    async fn read_metadata(&self, path: &Path) -> Result<PhotoMetadata, ConnectorError> {
        let Some(binary) = &self.binary else {
            return Ok(PhotoMetadata::default());
        };

        let mut args: Vec<String> = vec!["-j".into(), "-charset".into(), "iptc=UTF8".into()];
        args.extend(
            TITLE_TAGS
                .iter()
                .chain(DESCRIPTION_TAGS)
                .chain(KEYWORD_TAGS)
                .map(|tag| format!("-{tag}")),
        );
        args.push(path.to_string_lossy().into_owned());

        let output = process::run(binary.as_os_str(), &args, self.timeout)
            .await?
            .check("exiftool")?;
        parse_metadata_json(&output.stdout)
    }

    async fn write_copy(
        &self,
        path: &Path,
        metadata: &PhotoMetadata,
    ) -> Result<EmbeddedCopy, ConnectorError> {
        let Some(binary) = &self.binary else {
            return Err(ConnectorError::ToolUnavailable);
        };

        let dir = tempfile::Builder::new().prefix("photobridge-").tempdir()?;
        let file_name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "photo".into());
        let dest = dir.path().join(file_name);

        let mut args = embed_args(metadata);
        args.push("-o".into());
        args.push(dest.to_string_lossy().into_owned());
        args.push(path.to_string_lossy().into_owned());

        process::run(binary.as_os_str(), &args, self.timeout)
            .await?
            .check("exiftool")?;

        if !dest.exists() {
            return Err(ConnectorError::ProcessFailed {
                program: "exiftool".into(),
                code: Some(0),
                stderr: "no output file was written".into(),
            });
        }

        debug!(
            component = "exiftool",
            event = "exiftool.embed.written",
            source = %path.display(),
            copy = %dest.display(),
            "Wrote metadata-embedded copy"
        );
        Ok(EmbeddedCopy::new(dir, dest))
    }
}

impl MetadataTool for ExifTool {
    fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn extract<'a>(
        &'a self,
        path: &'a Path,
    ) -> BoxFuture<'a, Result<PhotoMetadata, ConnectorError>> {
        Box::pin(self.read_metadata(path))
    }

    fn embed<'a>(
        &'a self,
        path: &'a Path,
        metadata: &'a PhotoMetadata,
    ) -> BoxFuture<'a, Result<EmbeddedCopy, ConnectorError>> {
        Box::pin(self.write_copy(path, metadata))
    }
}

fn resolve_exiftool_binary(configured: Option<&Path>) -> Option<PathBuf> {
    // 1. Config file
    if let Some(path) = configured {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!(
            component = "exiftool",
            event = "exiftool.binary.config_not_found",
            path = %path.display(),
            "Configured exiftool path does not exist, trying fallbacks"
        );
    }

    // 2. Env var override
    if let Some(path) = std::env::var_os(EXIFTOOL_ENV).map(PathBuf::from) {
        if path.exists() {
            return Some(path);
        }
    }

    // 3. Search PATH
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join("exiftool"))
        .find(|candidate| candidate.is_file())
}

/// Tag assignments for the non-empty fields of `metadata`.
fn embed_args(metadata: &PhotoMetadata) -> Vec<String> {
    let mut args = vec![
        "-charset".to_string(),
        "iptc=UTF8".to_string(),
        "-codedcharacterset=utf8".to_string(),
    ];

    let title = metadata.title.trim();
    if !title.is_empty() {
        args.push(format!("-XMP-dc:Title={title}"));
        args.push(format!("-IPTC:ObjectName={title}"));
    }

    let description = metadata.description.trim();
    if !description.is_empty() {
        args.push(format!("-XMP-dc:Description={description}"));
        args.push(format!("-IPTC:Caption-Abstract={description}"));
        args.push(format!("-EXIF:ImageDescription={description}"));
    }

    for tag in metadata.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        args.push(format!("-XMP-dc:Subject={tag}"));
        args.push(format!("-IPTC:Keywords={tag}"));
    }

    args
}

/// Parse `exiftool -j` output for a single file.
pub fn parse_metadata_json(stdout: &str) -> Result<PhotoMetadata, ConnectorError> {
    let records: Vec<Map<String, Value>> = serde_json::from_str(stdout)?;
    let Some(record) = records.into_iter().next() else {
        return Ok(PhotoMetadata::default());
    };

    let title = first_text(&record, TITLE_TAGS).unwrap_or_default();
    let description = first_text(&record, DESCRIPTION_TAGS).unwrap_or_default();

    let mut tags: Vec<String> = Vec::new();
    for tag in KEYWORD_TAGS
        .iter()
        .filter_map(|key| record.get(*key))
        .flat_map(text_list)
    {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    Ok(PhotoMetadata {
        title,
        description,
        tags,
    })
}

fn first_text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .filter_map(scalar_text)
        .find(|text| !text.is_empty())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// exiftool emits a single keyword as a scalar and several as an array.
fn text_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(scalar_text)
            .filter(|s| !s.is_empty())
            .collect(),
        other => scalar_text(other)
            .filter(|s| !s.is_empty())
            .into_iter()
            .collect(),
    }
}
