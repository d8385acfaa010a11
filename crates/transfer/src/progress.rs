use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Receives byte deltas from an active transfer.
///
/// Both strategies report through this single operation; the
/// implementation decides what the bytes mean for its own state.
pub trait ProgressObserver: Send + Sync {
    /// Records `delta` more bytes as durably written.
    fn update_progress(&self, delta: u64);
}

/// `st_blocks` is always counted in 512-byte units.
#[cfg(unix)]
const STAT_BLOCK_SIZE: u64 = 512;

/// Returns the bytes actually allocated on disk for `path`.
///
/// For a pre-sized sparse file this grows as data lands, unlike the
/// logical length which is fixed up front.
#[cfg(unix)]
pub async fn allocated_size(path: &Path) -> std::io::Result<u64> {
    use std::os::unix::fs::MetadataExt;

    let meta = tokio::fs::metadata(path).await?;
    Ok(meta.blocks() * STAT_BLOCK_SIZE)
}

/// Allocation is not observable here; uploads only report progress at
/// completion.
#[cfg(not(unix))]
pub async fn allocated_size(path: &Path) -> std::io::Result<u64> {
    tokio::fs::metadata(path).await?;
    Ok(0)
}

/// Periodically samples a file's allocated size and reports growth.
///
/// The copy used for uploads exposes no per-byte callback, so progress is
/// approximated: it can lag the real copy by up to one interval and is
/// rounded to filesystem blocks. Observations are clamped to `limit`
/// because block rounding can exceed the logical size.
pub struct SizePoller {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl SizePoller {
    /// Starts polling `path` every `interval` until [`stop`](Self::stop)
    /// is called or `scope` is cancelled.
    pub fn spawn(
        path: PathBuf,
        limit: u64,
        interval: Duration,
        scope: &CancellationToken,
        observer: Arc<dyn ProgressObserver>,
    ) -> Self {
        let stop = scope.child_token();
        let token = stop.clone();

        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            let mut last: u64 = 0;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match allocated_size(&path).await {
                            Ok(allocated) => {
                                let observed = allocated.min(limit);
                                if observed > last {
                                    observer.update_progress(observed - last);
                                    last = observed;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(path = %path.display(), "failed to get actual size of file: {e}");
                            }
                        }
                    }
                }
            }
        });

        Self { stop, handle }
    }

    /// Stops the poller and waits for it to exit.
    pub async fn stop(self) {
        self.stop.cancel();
        let _ = self.handle.await;
    }
}
