//! Extractor source — runs the headless-browser extractor as a child process
//! and reads its JSON report from stdout.
//!
//! The report is the last top-level JSON object on stdout. It may be
//! pretty-printed and share a line with a prefix (`Result: {`), and any log
//! lines before it are skipped:
//! ```json
//! {"found": true, "hasMarker": true, "text": "...", "screenshot": "latest_update.png",
//!  "documents": [{"section": "...", "name": "...", "url": "...", "date": "...", "isNew": false}]}
//! ```
//! or `{"error": "..."}` / `{"found": false}`.

use async_trait::async_trait;
use serde::Deserialize;
use starwatch_core::config::SourceConfig;
use starwatch_core::error::{Result, StarwatchError};
use starwatch_core::traits::SnapshotSource;
use starwatch_core::types::{Document, Listing, Snapshot, TrackedContent};
use std::path::PathBuf;
use std::process::Stdio;
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtractorReport {
    #[serde(default)]
    found: bool,
    #[serde(default, alias = "hasStar")]
    has_marker: bool,
    #[serde(default, alias = "text")]
    summary_text: String,
    documents: Option<Vec<Document>>,
    #[serde(alias = "screenshot")]
    image: Option<String>,
    error: Option<String>,
}

/// Snapshot source backed by an external extractor program.
pub struct ExtractorSource {
    config: SourceConfig,
    base_url: Option<Url>,
}

impl ExtractorSource {
    pub fn new(config: SourceConfig, base_url: &str) -> Self {
        let base_url = match Url::parse(base_url) {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::warn!("Invalid listing base_url '{base_url}': {e}; relative links kept as-is");
                None
            }
        };
        Self { config, base_url }
    }

    fn resolve_link(&self, link: &str) -> String {
        match &self.base_url {
            Some(base) => base
                .join(link.trim())
                .map(|u| u.to_string())
                .unwrap_or_else(|_| link.to_string()),
            None => link.to_string(),
        }
    }

    fn resolve_image(&self, image: &str) -> PathBuf {
        let path = PathBuf::from(image);
        match (&self.config.workdir, path.is_relative()) {
            (Some(dir), true) => PathBuf::from(dir).join(path),
            _ => path,
        }
    }

    /// Turn extractor stdout into a snapshot.
    pub fn parse_output(&self, stdout: &str) -> Result<Snapshot> {
        let value = last_json_object(stdout)
            .ok_or_else(|| StarwatchError::fetch("extractor printed no JSON report"))?;
        let report: ExtractorReport = serde_json::from_value(value)
            .map_err(|e| StarwatchError::fetch(format!("malformed extractor report: {e}")))?;

        if let Some(error) = report.error {
            return Err(StarwatchError::fetch(error));
        }
        if !report.found {
            return Ok(Snapshot::NotFound);
        }

        let content = match report.documents {
            Some(docs) => TrackedContent::Documents(
                docs.into_iter()
                    .map(|mut doc| {
                        doc.url = self.resolve_link(&doc.url);
                        doc
                    })
                    .collect(),
            ),
            None => TrackedContent::FreeText,
        };

        Ok(Snapshot::Found(Listing {
            has_marker: report.has_marker,
            summary_text: collapse_whitespace(&report.summary_text),
            content,
            image: report.image.as_deref().map(|i| self.resolve_image(i)),
        }))
    }
}

/// Last complete top-level JSON object in `text`. Objects nested inside
/// another one are never returned on their own.
fn last_json_object(text: &str) -> Option<serde_json::Value> {
    let mut last = None;
    let mut pos = 0;
    while let Some(offset) = text[pos..].find('{') {
        let start = pos + offset;
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<serde_json::Value>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() => {
                pos = start + stream.byte_offset();
                last = Some(value);
            }
            _ => pos = start + 1,
        }
    }
    last
}

/// Collapse runs of whitespace (table cells, newlines) into single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl SnapshotSource for ExtractorSource {
    fn name(&self) -> &str { "extractor" }

    async fn fetch(&self) -> Result<Snapshot> {
        let mut cmd = tokio::process::Command::new(&self.config.program);
        cmd.args(&self.config.args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        if let Some(dir) = &self.config.workdir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| {
            StarwatchError::fetch(format!("failed to start extractor '{}': {e}", self.config.program))
        })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        match self.parse_output(&stdout) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) if !output.status.success() => {
                let code = output.status.code().unwrap_or(-1);
                Err(StarwatchError::fetch(format!(
                    "extractor exited with {code}: {e}; stderr: {}",
                    stderr.trim()
                )))
            }
            Err(e) => Err(e),
        }
    }
}
