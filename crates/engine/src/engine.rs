use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fileprov_protocol::constants::WORK_DIRECTORY_NAME;
use fileprov_protocol::{FileInfo, FileState, SourceType};
use fileprov_transfer::{calculate_file_md5, validate_file_name};
use tokio_util::sync::CancellationToken;

use crate::disk::read_disk_uuid;
use crate::record::TransferRecord;
use crate::signal::{TerminalReceiver, TerminalSignal, terminal_signal};
use crate::{EngineConfig, ProvisionError, TransferFailed};

/// What to provision, as given at startup.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub file_name: String,
    pub source_type: SourceType,
    pub parameters: HashMap<String, String>,
}

/// Owns the transfer record and drives one transfer to a terminal state.
pub struct FileProvisioner {
    pub(crate) config: EngineConfig,
    pub(crate) record: Arc<TransferRecord>,
    pub(crate) http: reqwest::Client,
    pub(crate) scope: CancellationToken,
    signal: TerminalSignal,
    completion_taken: AtomicBool,
    close_requested: CancellationToken,
}

/// Permission to run the completion routine. Only one is ever handed out.
pub(crate) struct Completion {
    fp: Arc<FileProvisioner>,
}

impl FileProvisioner {
    /// Creates the record and starts the configured strategy.
    ///
    /// Errors returned here are startup-fatal. A pull whose probe fails is
    /// not: the failure is recorded and delivered on the returned receiver.
    /// Cancelling `scope` aborts any transfer in flight.
    pub async fn launch(
        config: EngineConfig,
        request: ProvisionRequest,
        scope: CancellationToken,
    ) -> Result<(Arc<Self>, TerminalReceiver), ProvisionError> {
        validate_file_name(&request.file_name)?;
        let disk_uuid = read_disk_uuid(&config.disk_path).await?;

        let work_dir = config.disk_path.join(WORK_DIRECTORY_NAME);
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|source| ProvisionError::WorkDirectory {
                path: work_dir.clone(),
                source,
            })?;
        let file_path = work_dir.join(&request.file_name);

        let http = reqwest::Client::builder().build()?;
        let record = Arc::new(TransferRecord::new(
            disk_uuid,
            request.source_type,
            request.parameters,
            request.file_name,
            file_path,
        ));
        let (signal, terminal) = terminal_signal();

        let fp = Arc::new(Self {
            config,
            record,
            http,
            scope,
            signal,
            completion_taken: AtomicBool::new(false),
            close_requested: CancellationToken::new(),
        });
        fp.record.mark_starting();

        tracing::info!(
            path = %fp.record.file_path().display(),
            source_type = %request.source_type,
            "file provisioning started"
        );

        match request.source_type {
            SourceType::Url => fp.start_pull().await,
            SourceType::Upload => {
                tracing::info!("waiting for upload");
            }
        }

        Ok((fp, terminal))
    }

    /// Current status, read under the record's read lock.
    pub fn status(&self) -> FileInfo {
        self.record.snapshot()
    }

    pub fn record(&self) -> &TransferRecord {
        &self.record
    }

    /// Handles an operator close request.
    ///
    /// Closing before the file is ready is an abort: the caller gets
    /// [`ProvisionError::PrematureClose`] and the same failure goes out on
    /// the terminal signal. The state is a snapshot read, so a close racing
    /// the final transition may land on either side of it.
    pub fn close(&self) -> Result<(), ProvisionError> {
        let state = self.record.state();
        if state != FileState::Ready {
            tracing::warn!(%state, "close requested before the file is ready");
            self.signal.fire(Err(ProvisionError::PrematureClose(state)));
            return Err(ProvisionError::PrematureClose(state));
        }

        tracing::info!("close requested");
        self.signal.fire(Ok(()));
        self.close_requested.cancel();
        Ok(())
    }

    /// Resolves once a successful [`close`](Self::close) was handled.
    pub async fn closed(&self) {
        self.close_requested.cancelled().await;
    }

    pub(crate) fn is_completion_taken(&self) -> bool {
        self.completion_taken.load(Ordering::Acquire)
    }

    pub(crate) fn take_completion(self: &Arc<Self>) -> Option<Completion> {
        if self.completion_taken.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(Completion {
            fp: Arc::clone(self),
        })
    }

    async fn finalize(&self) -> Result<(i64, String), ProvisionError> {
        let path = self.record.file_path().to_path_buf();
        let meta = tokio::fs::metadata(&path).await?;
        let size = i64::try_from(meta.len()).unwrap_or(i64::MAX);
        let md5 = tokio::task::spawn_blocking(move || calculate_file_md5(&path)).await??;
        Ok((size, md5))
    }
}

impl Completion {
    /// Runs the completion routine with the strategy's result.
    ///
    /// On success the file is stat'ed and hashed before the record turns
    /// `ready`. Any failure turns it `failed`. Either way the outcome is
    /// sent on the terminal signal, and a copy of a failure is returned
    /// for a caller still waiting on the transfer.
    pub(crate) async fn finish(self, result: Result<(), ProvisionError>) -> Result<(), ProvisionError> {
        let fp = self.fp;
        let outcome = match result {
            Ok(()) => fp.finalize().await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok((size, md5)) => {
                if fp.record.complete(size, md5) {
                    tracing::info!(
                        path = %fp.record.file_path().display(),
                        size,
                        "file provisioning finished"
                    );
                }
                fp.signal.fire(Ok(()));
                Ok(())
            }
            Err(e) => {
                let failed = TransferFailed {
                    path: fp.record.file_path().to_path_buf(),
                    message: e.to_string(),
                };
                tracing::error!("{failed}");
                fp.record.fail(failed.to_string());
                fp.signal.fire(Err(failed.clone().into()));
                Err(failed.into())
            }
        }
    }
}
