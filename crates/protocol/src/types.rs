use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Sentinel stored in `size` when the source does not report a length.
pub const UNKNOWN_SIZE: i64 = -1;

/// Lifecycle state of the provisioned file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileState {
    #[default]
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "starting")]
    Starting,
    #[serde(rename = "in_progress")]
    InProgress,
    #[serde(rename = "ready")]
    Ready,
    #[serde(rename = "failed")]
    Failed,
}

impl FileState {
    /// Returns `true` for `ready` and `failed`, which never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, FileState::Ready | FileState::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FileState::Pending => "pending",
            FileState::Starting => "starting",
            FileState::InProgress => "in_progress",
            FileState::Ready => "ready",
            FileState::Failed => "failed",
        }
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the file content comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceType {
    /// Downloaded from `parameters["url"]`.
    #[default]
    #[serde(rename = "url")]
    Url,
    /// Pushed by a caller through `POST /v1/file?action=upload`.
    #[serde(rename = "upload")]
    Upload,
}

impl SourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::Url => "url",
            SourceType::Upload => "upload",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unsupported source type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown data source type: {0}")]
pub struct UnknownSourceType(pub String);

impl FromStr for SourceType {
    type Err = UnknownSourceType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url" => Ok(SourceType::Url),
            "upload" => Ok(SourceType::Upload),
            other => Err(UnknownSourceType(other.to_string())),
        }
    }
}

/// Status record returned by `GET /v1/file`.
///
/// Every field is always serialized; fields that do not apply yet are
/// empty or zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    #[serde(rename = "diskUUID")]
    pub disk_uuid: String,
    pub source_type: SourceType,
    pub parameters: HashMap<String, String>,

    pub file_name: String,
    pub file_path: String,
    pub state: FileState,
    pub size: i64,
    pub progress: i32,
    pub processed_size: i64,
    pub md5_checksum: String,
}

/// Contents of the disk identity file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskConfig {
    #[serde(rename = "diskUUID")]
    pub disk_uuid: String,
}
