use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ProgressObserver, TransferError};

/// Cancels `scope` if it is not kicked at least once per `idle` window.
struct Watchdog {
    kick: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl Watchdog {
    fn arm(scope: CancellationToken, idle: Duration) -> Self {
        let kick = Arc::new(Notify::new());
        let kicked = Arc::clone(&kick);

        let handle = tokio::spawn(async move {
            let deadline = tokio::time::sleep(idle);
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    _ = scope.cancelled() => return,
                    _ = &mut deadline => {
                        tracing::warn!(?idle, "no data received within the idle window, cancelling transfer");
                        scope.cancel();
                        return;
                    }
                    _ = kicked.notified() => {
                        deadline.as_mut().reset(tokio::time::Instant::now() + idle);
                    }
                }
            }
        });

        Self { kick, handle }
    }

    fn kick(&self) {
        self.kick.notify_one();
    }

    async fn disarm(self) {
        self.handle.abort();
        let _ = self.handle.await;
    }
}

/// Copies `src` into `dst` until EOF, reporting every written chunk.
///
/// A watchdog cancels `scope` when no chunk completes within `idle`; the
/// copy then fails with [`TransferError::TimedOut`]. Cancelling `scope`
/// from outside has the same effect. The watchdog is torn down before the
/// result is returned, so it cannot fire after a successful copy.
pub async fn idle_timeout_copy<R, W>(
    src: &mut R,
    dst: &mut W,
    observer: &dyn ProgressObserver,
    scope: &CancellationToken,
    idle: Duration,
    buf_size: usize,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let watchdog = Watchdog::arm(scope.clone(), idle);
    let result = copy_chunks(src, dst, observer, scope, idle, buf_size, &watchdog).await;
    watchdog.disarm().await;
    result
}

async fn copy_chunks<R, W>(
    src: &mut R,
    dst: &mut W,
    observer: &dyn ProgressObserver,
    scope: &CancellationToken,
    idle: Duration,
    buf_size: usize,
    watchdog: &Watchdog,
) -> Result<u64, TransferError>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut buf = vec![0u8; buf_size.max(1)];
    let mut written: u64 = 0;

    loop {
        let n = tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(TransferError::TimedOut(idle)),
            read = src.read(&mut buf) => read?,
        };
        if n == 0 {
            break;
        }

        tokio::select! {
            biased;
            _ = scope.cancelled() => return Err(TransferError::TimedOut(idle)),
            write = dst.write_all(&buf[..n]) => write?,
        }

        watchdog.kick();
        written += n as u64;
        observer.update_progress(n as u64);
    }

    dst.flush().await?;
    Ok(written)
}
