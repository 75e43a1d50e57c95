//! Single-slot admission channel between the API and the worker
//!
//! Pushing overwrites whatever the worker has not yet consumed; it never blocks
//! and never fails except after close.

use tokio::sync::watch;
use tracing::debug;

use crate::error::{CoordinatorError, CoordinatorResult};
use crate::experiment::ExperimentCode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Empty,
    Pending(ExperimentCode),
    Closed,
}

/// Create a connected sender/receiver pair
pub(crate) fn channel() -> (AdmissionSender, AdmissionReceiver) {
    let (tx, rx) = watch::channel(Slot::Empty);
    (AdmissionSender { tx }, AdmissionReceiver { rx })
}

/// Producer half, shared by every handle
pub(crate) struct AdmissionSender {
    tx: watch::Sender<Slot>,
}

impl AdmissionSender {
    /// Hand a code to the worker, replacing any unconsumed one
    pub(crate) fn push(&self, code: ExperimentCode) -> CoordinatorResult<()> {
        debug!(%code, "AdmissionSender::push: called");
        let mut open = true;
        self.tx.send_if_modified(|slot| {
            if *slot == Slot::Closed {
                open = false;
                return false;
            }
            *slot = Slot::Pending(code);
            true
        });
        if open { Ok(()) } else { Err(CoordinatorError::Closed) }
    }

    /// Close the channel; the worker's next `pop` returns `None`
    pub(crate) fn close(&self) {
        debug!("AdmissionSender::close: called");
        self.tx.send_replace(Slot::Closed);
    }
}

/// Consumer half, owned by the worker
pub(crate) struct AdmissionReceiver {
    rx: watch::Receiver<Slot>,
}

impl AdmissionReceiver {
    /// Wait for the next admitted code; `None` once the channel is closed
    pub(crate) async fn pop(&mut self) -> Option<ExperimentCode> {
        loop {
            if self.rx.changed().await.is_err() {
                debug!("AdmissionReceiver::pop: sender dropped");
                return None;
            }
            match *self.rx.borrow_and_update() {
                Slot::Pending(code) => return Some(code),
                Slot::Closed => return None,
                Slot::Empty => continue,
            }
        }
    }

    /// Take a pending code without waiting
    #[cfg(test)]
    pub(crate) fn try_pop(&mut self) -> Option<ExperimentCode> {
        if !self.rx.has_changed().unwrap_or(false) {
            return None;
        }
        match *self.rx.borrow_and_update() {
            Slot::Pending(code) => Some(code),
            Slot::Empty | Slot::Closed => None,
        }
    }
}
