//! One-shot terminal signal between the engine and the hosting process.

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::ProvisionError;

/// Outcome of the transfer as seen by the hosting process.
pub type TerminalOutcome = Result<(), ProvisionError>;

/// Sending half. The sender is taken on first use, so a second
/// [`fire`](Self::fire) has nothing to send with.
#[derive(Debug)]
pub(crate) struct TerminalSignal {
    tx: Mutex<Option<oneshot::Sender<TerminalOutcome>>>,
}

/// Receiving half, consumed by the single awaiting caller.
#[derive(Debug)]
pub struct TerminalReceiver {
    rx: oneshot::Receiver<TerminalOutcome>,
}

pub(crate) fn terminal_signal() -> (TerminalSignal, TerminalReceiver) {
    let (tx, rx) = oneshot::channel();
    (
        TerminalSignal {
            tx: Mutex::new(Some(tx)),
        },
        TerminalReceiver { rx },
    )
}

impl TerminalSignal {
    /// Sends `outcome` if nothing was sent yet. Returns whether it was sent.
    pub(crate) fn fire(&self, outcome: TerminalOutcome) -> bool {
        let Some(tx) = self.tx.lock().take() else {
            return false;
        };
        if tx.send(outcome).is_err() {
            tracing::debug!("terminal receiver already dropped");
        }
        true
    }

    pub(crate) fn is_fired(&self) -> bool {
        self.tx.lock().is_none()
    }
}

impl TerminalReceiver {
    /// Waits for the transfer outcome.
    pub async fn recv(self) -> TerminalOutcome {
        self.rx.await.unwrap_or(Err(ProvisionError::SignalDropped))
    }
}
