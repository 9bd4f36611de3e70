//! Project file export and import.
//!
//! A project file is a JSON envelope around a canvas snapshot:
//! `{version: 1, meta: {name, date, app: "jiukisidian"}, data: <snapshot>}`.
//! Import parses and validates the whole file before the document is
//! touched, so a bad file never leaves a half-loaded canvas.

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::document::{CanvasSnapshot, Document};
use crate::error::{BoardError, Result};

/// Extension of exported project files (without the dot)
pub const FILE_EXTENSION: &str = "jiukisidian";
pub const ENVELOPE_VERSION: u32 = 1;
pub const APP_NAME: &str = "jiukisidian";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFileMeta {
    #[serde(default)]
    pub name: String,
    /// RFC 3339 / ISO 8601 timestamp of the export
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub app: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    #[serde(default = "default_version")]
    pub version: u32,
    pub meta: ProjectFileMeta,
    pub data: CanvasSnapshot,
}

fn default_version() -> u32 {
    ENVELOPE_VERSION
}

impl ProjectFile {
    /// Wrap a snapshot for export, stamped with the current time
    pub fn new(name: impl Into<String>, data: CanvasSnapshot) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            meta: ProjectFileMeta {
                name: name.into(),
                date: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                app: APP_NAME.to_string(),
            },
            data,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an envelope. Missing or empty `data`/`meta` is a format error.
    pub fn decode(json: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| BoardError::format(e.to_string()))?;
        for field in ["data", "meta"] {
            if !value.get(field).is_some_and(is_present) {
                return Err(BoardError::format(format!("missing `{field}`")));
            }
        }
        let file: ProjectFile =
            serde_json::from_value(value).map_err(|e| BoardError::format(e.to_string()))?;
        if file.version != ENVELOPE_VERSION {
            warn!(version = file.version, "unexpected project file version, loading anyway");
        }
        Ok(file)
    }
}

/// Null, false, zero and the empty string count as absent
fn is_present(value: &serde_json::Value) -> bool {
    use serde_json::Value;
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// `My Project` → `My_Project.jiukisidian`
pub fn file_name_for(project_name: &str) -> String {
    let stem = project_name.split_whitespace().collect::<Vec<_>>().join("_");
    let stem = if stem.is_empty() { "project".to_string() } else { stem };
    format!("{stem}.{FILE_EXTENSION}")
}

/// Write the document's snapshot as a project file into `dir`
pub async fn save_project_to_file(doc: &Document, project_name: &str, dir: &Path) -> Result<PathBuf> {
    let file = ProjectFile::new(project_name, doc.get_snapshot());
    let json = file.encode()?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name_for(project_name));
    tokio::fs::write(&path, json).await?;
    info!(path = %path.display(), "project saved to file");
    Ok(path)
}

/// Read and validate a project file without touching any document
pub async fn read_project_file(path: &Path) -> Result<ProjectFile> {
    let json = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| BoardError::Io(format!("failed to read {}: {e}", path.display())))?;
    ProjectFile::decode(&json)
}
