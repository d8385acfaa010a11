//! Transfer mechanics shared by the pull and upload strategies.
//!
//! Nothing in here knows about the transfer record: progress flows out
//! through the [`ProgressObserver`] trait and cancellation flows in through
//! a [`CancellationToken`](tokio_util::sync::CancellationToken).

mod checksum;
mod copy;
mod progress;
mod validation;

pub use checksum::{calculate_file_md5, md5_bytes};
pub use copy::idle_timeout_copy;
pub use progress::{ProgressObserver, SizePoller, allocated_size};
pub use validation::{parse_upload_size, validate_file_name};

use std::time::Duration;

/// Read buffer used when streaming a source into the destination: 512 KiB.
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 512 * 1024;

/// How often the upload poller samples the destination's allocated size.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised both by the idle watchdog and by external cancellation.
    #[error("transfer timed out: no data for {0:?} or the transfer was cancelled")]
    TimedOut(Duration),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid upload size {0:?}")]
    InvalidSize(String),

    #[error(
        "the uploaded file size {size} should be a multiple of {sector} bytes since the destination uses direct I/O"
    )]
    MisalignedSize { size: i64, sector: i64 },
}
