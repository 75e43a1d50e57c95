//! Abort and mission-cycle signals shared between callers and the run loop

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tracing::debug;

/// Why a `WaitForNextCycle` park ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    Cycle,
    Abort,
    Closed,
}

/// Level-triggered flags plus one wakeup for the single waiting run
///
/// `wake` is only ever awaited by the worker. `notify_one` keeps a permit when
/// nobody is parked, so a signal raised between the flag check and the await
/// is not lost; a stale permit only costs one extra flag check.
#[derive(Debug, Default)]
pub(crate) struct RunSignals {
    abort: AtomicBool,
    closed: AtomicBool,
    cycle_started: AtomicBool,
    cycle_requested: AtomicBool,
    wake: Notify,
}

impl RunSignals {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn request_abort(&self) {
        debug!("RunSignals::request_abort: called");
        self.abort.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    /// Consume a pending abort
    pub(crate) fn take_abort(&self) -> bool {
        self.abort.swap(false, Ordering::SeqCst)
    }

    /// Coordinator shutdown; unlike abort this is never cleared
    pub(crate) fn close(&self) {
        debug!("RunSignals::close: called");
        self.closed.store(true, Ordering::SeqCst);
        self.wake.notify_one();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn clear_abort(&self) {
        self.abort.store(false, Ordering::SeqCst);
    }

    pub(crate) fn clear_cycle_started(&self) {
        self.cycle_started.store(false, Ordering::SeqCst);
    }

    /// Mission loop tick: wake the parked run if one asked for it
    ///
    /// Returns whether a waiter was signalled.
    pub(crate) fn notify_cycle(&self) -> bool {
        if self.cycle_requested.swap(false, Ordering::SeqCst) {
            debug!("RunSignals::notify_cycle: waking parked run");
            self.cycle_started.store(true, Ordering::SeqCst);
            self.wake.notify_one();
            true
        } else {
            false
        }
    }

    /// Park until the next mission tick, an abort or close, with no timeout
    pub(crate) async fn wait_for_cycle_or_abort(&self) -> Wake {
        debug!("RunSignals::wait_for_cycle_or_abort: called");
        self.cycle_requested.store(true, Ordering::SeqCst);
        loop {
            if self.cycle_started.swap(false, Ordering::SeqCst) {
                return Wake::Cycle;
            }
            if self.abort.load(Ordering::SeqCst) {
                self.cycle_requested.store(false, Ordering::SeqCst);
                return Wake::Abort;
            }
            if self.is_closed() {
                self.cycle_requested.store(false, Ordering::SeqCst);
                return Wake::Closed;
            }
            self.wake.notified().await;
        }
    }
}
