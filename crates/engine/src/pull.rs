//! Pull strategy: download the file from `parameters["url"]`.

use std::sync::Arc;

use fileprov_protocol::UNKNOWN_SIZE;
use fileprov_protocol::constants::PARAMETER_URL;
use fileprov_transfer::{TransferError, idle_timeout_copy};
use futures_util::TryStreamExt;
use reqwest::StatusCode;
use tokio_util::io::StreamReader;

use crate::{FileProvisioner, ProvisionError};

impl FileProvisioner {
    /// Probes the source size, then downloads in the background.
    ///
    /// Returns once the download is spawned. Failures before that point
    /// still go through the completion routine.
    pub(crate) async fn start_pull(self: &Arc<Self>) {
        let Some(completion) = self.take_completion() else {
            return;
        };

        let Some(url) = self.record.parameter(PARAMETER_URL).map(str::to_owned) else {
            let _ = completion.finish(Err(ProvisionError::NoUrl)).await;
            return;
        };

        match self.probe_size(&url).await {
            Ok(size) if size > 0 => self.record.set_total_size(size),
            Ok(_) => tracing::info!(%url, "source did not report a size"),
            Err(e) => {
                let _ = completion.finish(Err(e)).await;
                return;
            }
        }

        let fp = Arc::clone(self);
        tokio::spawn(async move {
            let result = fp.download(&url).await;
            let _ = completion.finish(result).await;
        });
    }

    /// Reads the declared length of `url`, or [`UNKNOWN_SIZE`].
    async fn probe_size(&self, url: &str) -> Result<i64, ProvisionError> {
        let resp = self
            .http
            .get(url)
            .timeout(self.config.probe_timeout)
            .send()
            .await?;
        check_status(url, resp.status())?;

        Ok(resp
            .content_length()
            .and_then(|len| i64::try_from(len).ok())
            .unwrap_or(UNKNOWN_SIZE))
    }

    /// Streams `url` into the destination file.
    ///
    /// The transfer runs under a child of the provisioning scope. The idle
    /// watchdog cancels that child, so a stall ends this transfer without
    /// touching the parent. Waiting for the response headers counts
    /// against the same idle window.
    async fn download(&self, url: &str) -> Result<(), ProvisionError> {
        let scope = self.scope.child_token();
        let idle = self.config.idle_timeout;

        let resp = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(ProvisionError::Cancelled),
            resp = tokio::time::timeout(idle, self.http.get(url).send()) => {
                resp.map_err(|_| TransferError::TimedOut(idle))??
            }
        };
        check_status(url, resp.status())?;

        let path = self.record.file_path();
        let mut file = tokio::fs::File::create(path).await?;

        let body = resp.bytes_stream().map_err(std::io::Error::other);
        let reader = StreamReader::new(body);
        tokio::pin!(reader);

        let written = idle_timeout_copy(
            &mut reader,
            &mut file,
            self.record.as_ref(),
            &scope,
            idle,
            self.config.copy_buffer_size,
        )
        .await?;
        file.sync_all().await?;

        tracing::debug!(%url, written, "download finished");
        Ok(())
    }
}

fn check_status(url: &str, status: StatusCode) -> Result<(), ProvisionError> {
    if status != StatusCode::OK {
        return Err(ProvisionError::UnexpectedStatus {
            url: url.to_string(),
            status,
        });
    }
    Ok(())
}
