use std::collections::HashMap;
use std::path::{Path, PathBuf};

use fileprov_protocol::{FileInfo, FileState, SourceType, UNKNOWN_SIZE};
use fileprov_transfer::ProgressObserver;
use parking_lot::RwLock;

/// The single transfer tracked by a running instance.
///
/// Identity fields are fixed at construction and read without locking.
/// Everything that changes during the transfer lives in [`Progress`]
/// behind a read/write lock that is never held across I/O.
#[derive(Debug)]
pub struct TransferRecord {
    disk_uuid: String,
    source_type: SourceType,
    parameters: HashMap<String, String>,
    file_name: String,
    file_path: PathBuf,
    progress: RwLock<Progress>,
}

#[derive(Debug)]
struct Progress {
    state: FileState,
    size: i64,
    processed_size: i64,
    percent: i32,
    md5_checksum: String,
    failure_message: String,
}

impl Progress {
    fn recompute_percent(&mut self) {
        if self.size > 0 {
            let pct = (self.processed_size as i128 * 100) / self.size as i128;
            self.percent = pct.clamp(0, 100) as i32;
        }
    }
}

impl TransferRecord {
    pub fn new(
        disk_uuid: String,
        source_type: SourceType,
        parameters: HashMap<String, String>,
        file_name: String,
        file_path: PathBuf,
    ) -> Self {
        Self {
            disk_uuid,
            source_type,
            parameters,
            file_name,
            file_path,
            progress: RwLock::new(Progress {
                state: FileState::Pending,
                size: UNKNOWN_SIZE,
                processed_size: 0,
                percent: 0,
                md5_checksum: String::new(),
                failure_message: String::new(),
            }),
        }
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn state(&self) -> FileState {
        self.progress.read().state
    }

    /// Message stored when the transfer failed, empty otherwise.
    pub fn failure_message(&self) -> String {
        self.progress.read().failure_message.clone()
    }

    /// `pending` -> `starting`. Any later state is left alone.
    pub(crate) fn mark_starting(&self) {
        let mut p = self.progress.write();
        if p.state == FileState::Pending {
            p.state = FileState::Starting;
        }
    }

    /// Records the declared or probed size. Ignored once terminal.
    pub(crate) fn set_total_size(&self, size: i64) {
        let mut p = self.progress.write();
        if p.state.is_terminal() {
            return;
        }
        p.size = size;
        p.recompute_percent();
    }

    /// Commits a successful transfer. Returns `false` if the record was
    /// already terminal and nothing changed.
    pub(crate) fn complete(&self, size: i64, md5_checksum: String) -> bool {
        let mut p = self.progress.write();
        if p.state.is_terminal() {
            return false;
        }
        p.size = size;
        p.processed_size = size;
        p.percent = 100;
        p.md5_checksum = md5_checksum;
        p.state = FileState::Ready;
        true
    }

    /// Commits a failed transfer. Returns `false` if the record was
    /// already terminal and nothing changed.
    pub(crate) fn fail(&self, message: String) -> bool {
        let mut p = self.progress.write();
        if p.state.is_terminal() {
            return false;
        }
        p.failure_message = message;
        p.state = FileState::Failed;
        true
    }

    /// Consistent copy of the whole record for status reporting.
    pub fn snapshot(&self) -> FileInfo {
        let p = self.progress.read();
        FileInfo {
            disk_uuid: self.disk_uuid.clone(),
            source_type: self.source_type,
            parameters: self.parameters.clone(),
            file_name: self.file_name.clone(),
            file_path: self.file_path.display().to_string(),
            state: p.state,
            size: p.size,
            progress: p.percent,
            processed_size: p.processed_size,
            md5_checksum: p.md5_checksum.clone(),
        }
    }
}

impl ProgressObserver for TransferRecord {
    /// Terminal records drop late updates; a trailing poll after
    /// completion is expected and harmless.
    fn update_progress(&self, delta: u64) {
        let mut p = self.progress.write();
        match p.state {
            FileState::Ready | FileState::Failed => return,
            FileState::Pending | FileState::Starting => p.state = FileState::InProgress,
            FileState::InProgress => {}
        }
        let delta = i64::try_from(delta).unwrap_or(i64::MAX);
        p.processed_size = p.processed_size.saturating_add(delta);
        p.recompute_percent();
    }
}
