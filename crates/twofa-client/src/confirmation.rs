//! Confirmation channel between the coordinator and the code-entry UI
//!
//! The coordinator opens a confirmation and suspends on it; the UI watches
//! the prompt signal, collects the security code and resolves the
//! confirmation. There is no timeout: callers that need one wrap the wait.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};
use tokio::sync::{oneshot, watch};
use twofa_errors::{Error, Result};
use twofa_types::TxResponse;

/// Outcome delivered by the UI
#[derive(Clone, Debug, PartialEq)]
pub struct Confirmation {
    pub verified: bool,
    pub tx_response: Option<TxResponse>,
}

impl Confirmation {
    pub fn cancelled() -> Self {
        Self {
            verified: false,
            tx_response: None,
        }
    }
}

/// Single-slot confirmation channel
pub struct ConfirmationChannel {
    pending: Mutex<Option<oneshot::Sender<Confirmation>>>,
    prompt: watch::Sender<bool>,
}

impl Default for ConfirmationChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfirmationChannel {
    pub fn new() -> Self {
        let (prompt, _) = watch::channel(false);
        Self {
            pending: Mutex::new(None),
            prompt,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<oneshot::Sender<Confirmation>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open a confirmation and raise the prompt signal.
    ///
    /// Fails with `ConfirmationInFlight` while another confirmation is still
    /// awaited. A confirmation whose waiter went away no longer counts.
    pub fn open(&self) -> Result<PendingConfirmation> {
        let mut slot = self.slot();
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(Error::ConfirmationInFlight);
        }

        let (tx, rx) = oneshot::channel();
        *slot = Some(tx);
        self.prompt.send_replace(true);
        Ok(PendingConfirmation { rx })
    }

    /// Deliver the user's decision. Returns false when nothing was pending.
    pub fn resolve(&self, verified: bool, tx_response: Option<TxResponse>) -> bool {
        let sender = self.slot().take();
        self.prompt.send_replace(false);
        match sender {
            Some(tx) => tx
                .send(Confirmation {
                    verified,
                    tx_response,
                })
                .is_ok(),
            None => false,
        }
    }

    /// Resolve the pending confirmation as not verified
    pub fn cancel(&self) -> bool {
        self.resolve(false, None)
    }

    pub fn is_pending(&self) -> bool {
        self.slot().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Prompt signal: `true` while a confirmation waits for the user
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.prompt.subscribe()
    }
}

/// Future resolving once the UI answers; a dropped channel reads as cancelled
pub struct PendingConfirmation {
    rx: oneshot::Receiver<Confirmation>,
}

impl Future for PendingConfirmation {
    type Output = Confirmation;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_else(|_| Confirmation::cancelled()))
    }
}
