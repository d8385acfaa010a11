//! Error types for the provisioning engine.

use std::path::PathBuf;

use fileprov_protocol::{FileState, SourceType};
use fileprov_transfer::TransferError;

/// Errors produced by the provisioning engine.
///
/// Startup errors come out of [`FileProvisioner::launch`](crate::FileProvisioner::launch).
/// Request-local errors (bad size, missing field, premature close) are
/// returned to the caller without touching the transfer record. Everything
/// that ends a transfer is reported as [`ProvisionError::Failed`].
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Transfer(#[from] TransferError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("multipart error: {0}")]
    Multipart(#[from] multer::Error),

    #[error("upload task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("cannot find disk config file {}: {source}", .path.display())]
    DiskConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to unmarshal disk config file {}: {source}", .path.display())]
    DiskConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to create work directory {}: {source}", .path.display())]
    WorkDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no URL for file downloading")]
    NoUrl,

    #[error("expected status code 200 from {url}, got {status}")]
    UnexpectedStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("cannot do upload since data source type is {0} rather than upload")]
    WrongSourceType(SourceType),

    #[error("an upload has already been accepted for this file")]
    UploadAlreadyAccepted,

    #[error(
        "cannot get the uploaded data since the upload request doesn't contain form '{0}'"
    )]
    MissingUploadField(&'static str),

    #[error("received more than the declared {declared} bytes")]
    SizeExceeded { declared: i64 },

    #[error("upload was cancelled")]
    Cancelled,

    #[error("closing the server while the file provisioning is still in progress (state {0})")]
    PrematureClose(FileState),

    #[error(transparent)]
    Failed(#[from] TransferFailed),

    #[error("terminal signal dropped before an outcome was sent")]
    SignalDropped,
}

/// A failed transfer as recorded on the record and reported to callers.
///
/// Cloneable so the recorded message, the terminal signal and the caller
/// all see the same value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to finish file {} provisioning: {message}", .path.display())]
pub struct TransferFailed {
    pub path: PathBuf,
    pub message: String,
}
