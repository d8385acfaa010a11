//! The provisioning engine.
//!
//! Owns the single transfer record of a running instance, runs one of two
//! strategies to populate the destination file (pull from a URL or accept
//! an upload), finalizes the record with an MD5 checksum, and reports the
//! outcome exactly once through a [`TerminalReceiver`].
//!
//! # Locking
//!
//! The record sits behind one read/write lock. Status reads take the read
//! side; progress updates and the completion routine take the write side.
//! The lock is never held across I/O.

mod disk;
mod engine;
mod error;
mod pull;
mod record;
mod signal;
mod upload;

pub use disk::read_disk_uuid;
pub use engine::{FileProvisioner, ProvisionRequest};
pub use error::{ProvisionError, TransferFailed};
pub use record::TransferRecord;
pub use signal::{TerminalOutcome, TerminalReceiver};

use std::path::PathBuf;
use std::time::Duration;

use fileprov_protocol::constants::{DEFAULT_DISK_PATH, HTTP_TIMEOUT};
use fileprov_transfer::{DEFAULT_COPY_BUFFER_SIZE, DEFAULT_POLL_INTERVAL};

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root of the disk holding the identity file and the work directory.
    pub disk_path: PathBuf,
    /// A pull transfer that makes no progress for this long is aborted.
    pub idle_timeout: Duration,
    /// Upper bound for the source size probe.
    pub probe_timeout: Duration,
    /// Sampling interval of the upload progress poller.
    pub poll_interval: Duration,
    /// Read buffer of the pull copy loop.
    pub copy_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            disk_path: PathBuf::from(DEFAULT_DISK_PATH),
            idle_timeout: HTTP_TIMEOUT,
            probe_timeout: HTTP_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            copy_buffer_size: DEFAULT_COPY_BUFFER_SIZE,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use fileprov_protocol::SourceType;
    use fileprov_protocol::constants::DISK_CONFIG_FILE;
    use tokio_util::sync::CancellationToken;

    use crate::{EngineConfig, FileProvisioner, ProvisionRequest, TerminalReceiver};

    pub const DISK_UUID: &str = "0b3c1c5e-test-disk";

    /// Writes a valid identity file under `root`.
    pub fn write_disk_config(root: &Path) {
        std::fs::write(
            root.join(DISK_CONFIG_FILE),
            format!(r#"{{"diskUUID":"{DISK_UUID}"}}"#),
        )
        .unwrap();
    }

    pub fn test_config(root: &Path) -> EngineConfig {
        EngineConfig {
            disk_path: root.to_path_buf(),
            idle_timeout: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
            copy_buffer_size: 64 * 1024,
        }
    }

    pub async fn launch(
        config: EngineConfig,
        source_type: SourceType,
        parameters: HashMap<String, String>,
    ) -> (Arc<FileProvisioner>, TerminalReceiver, CancellationToken) {
        let scope = CancellationToken::new();
        let request = ProvisionRequest {
            file_name: "backing.img".into(),
            source_type,
            parameters,
        };
        let (fp, terminal) = FileProvisioner::launch(config, request, scope.clone())
            .await
            .unwrap();
        (fp, terminal, scope)
    }
}
