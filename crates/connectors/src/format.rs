//! Output formatting for uploaded photos

use std::str::FromStr;

use serde::Deserialize;

use crate::ConnectorError;

/// How an uploaded photo is reported back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Url,
    Markdown,
    Html,
    Page,
}

impl FromStr for OutputFormat {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "url" => Ok(OutputFormat::Url),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            "page" => Ok(OutputFormat::Page),
            other => Err(ConnectorError::UnknownFormat(other.to_string())),
        }
    }
}

/// What a backend reports after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPhoto {
    pub url: String,
    #[serde(default)]
    pub page_url: Option<String>,
}

impl UploadedPhoto {
    /// Parse backend stdout: a JSON object or a bare URL on the first
    /// non-empty line.
    pub fn parse(stdout: &str) -> Result<Self, ConnectorError> {
        let trimmed = stdout.trim();
        if trimmed.starts_with('{') {
            let photo: UploadedPhoto = serde_json::from_str(trimmed)?;
            if photo.url.trim().is_empty() {
                return Err(ConnectorError::BackendError("backend reported an empty url".into()));
            }
            return Ok(photo);
        }

        match trimmed.lines().map(str::trim).find(|l| !l.is_empty()) {
            Some(url) => Ok(UploadedPhoto {
                url: url.to_string(),
                page_url: None,
            }),
            None => Err(ConnectorError::BackendError("backend printed no url".into())),
        }
    }

    pub fn render(&self, format: OutputFormat, alt: &str) -> String {
        match format {
            OutputFormat::Url => self.url.clone(),
            OutputFormat::Markdown => format!("![{}]({})", alt.replace(']', "\\]"), self.url),
            OutputFormat::Html => format!(
                "<img src=\"{}\" alt=\"{}\">",
                escape_attr(&self.url),
                escape_attr(alt)
            ),
            OutputFormat::Page => self.page_url.clone().unwrap_or_else(|| self.url.clone()),
        }
    }
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
