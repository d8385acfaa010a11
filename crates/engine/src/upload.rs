//! Accept-upload strategy: receive the file from a multipart request.

use std::path::Path;
use std::sync::Arc;

use fileprov_protocol::SourceType;
use fileprov_protocol::constants::{DEFAULT_SECTOR_SIZE, UPLOAD_FIELD_NAME};
use fileprov_transfer::{ProgressObserver, SizePoller, parse_upload_size};
use multer::{Field, Multipart};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use crate::{FileProvisioner, ProvisionError};

impl FileProvisioner {
    /// Receives the upload carried by `multipart`, declared as `size` bytes.
    ///
    /// Validation failures (wrong source type, bad or misaligned size,
    /// missing `chunk` field, a second upload) are returned without
    /// touching the record or the destination file. Once the field is
    /// found the transfer is committed: it runs in its own task, so a
    /// caller that goes away does not abandon it, and its outcome goes
    /// through the completion routine.
    pub async fn upload(
        self: &Arc<Self>,
        size: Option<&str>,
        mut multipart: Multipart<'static>,
    ) -> Result<(), ProvisionError> {
        let source_type = self.record.source_type();
        if source_type != SourceType::Upload {
            return Err(ProvisionError::WrongSourceType(source_type));
        }
        let size = parse_upload_size(size, DEFAULT_SECTOR_SIZE)?;
        if self.is_completion_taken() {
            return Err(ProvisionError::UploadAlreadyAccepted);
        }

        let field = upload_field(&mut multipart).await?;
        let Some(completion) = self.take_completion() else {
            return Err(ProvisionError::UploadAlreadyAccepted);
        };
        self.record.set_total_size(size);
        tracing::info!(size, "receiving upload");

        let fp = Arc::clone(self);
        let scope = self.scope.child_token();
        let task = tokio::spawn(async move {
            let result = fp.receive(field, size, &scope).await;
            completion.finish(result).await
        });
        task.await?
    }

    async fn receive(
        &self,
        mut field: Field<'static>,
        size: i64,
        scope: &CancellationToken,
    ) -> Result<(), ProvisionError> {
        let path = self.record.file_path();
        let mut file = presize(path, size).await?;

        let observer: Arc<dyn ProgressObserver> = self.record.clone();
        let poller = SizePoller::spawn(
            path.to_path_buf(),
            u64::try_from(size).unwrap_or(0),
            self.config.poll_interval,
            scope,
            observer,
        );
        let copied = copy_field(&mut field, &mut file, size, scope).await;
        poller.stop().await;
        copied?;

        file.sync_all().await?;
        Ok(())
    }
}

/// Skips to the `chunk` field, warning about anything else on the way.
async fn upload_field(multipart: &mut Multipart<'static>) -> Result<Field<'static>, ProvisionError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(UPLOAD_FIELD_NAME) {
            return Ok(field);
        }
        tracing::warn!(
            form = field.name().unwrap_or_default(),
            "unexpected form in upload request, ignoring it"
        );
    }
    Err(ProvisionError::MissingUploadField(UPLOAD_FIELD_NAME))
}

/// Replaces any existing file at `path` with one pre-sized to `size`.
async fn presize(path: &Path, size: i64) -> Result<File, ProvisionError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;
    file.set_len(u64::try_from(size).unwrap_or(0)).await?;
    Ok(file)
}

async fn copy_field(
    field: &mut Field<'static>,
    file: &mut File,
    size: i64,
    scope: &CancellationToken,
) -> Result<u64, ProvisionError> {
    let mut received: u64 = 0;
    let limit = u64::try_from(size).unwrap_or(0);

    loop {
        let chunk = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(ProvisionError::Cancelled),
            chunk = field.chunk() => chunk?,
        };
        let Some(chunk) = chunk else {
            break;
        };

        received += chunk.len() as u64;
        if received > limit {
            return Err(ProvisionError::SizeExceeded { declared: size });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(received)
}
