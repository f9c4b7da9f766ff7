// running.rs

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

/// Session-wide "still running" flag. Starts true, flips to false once and
/// stays there. Waiters on `stopped()` are woken by the flip.
#[derive(Clone)]
pub struct Running {
    flag: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl Running {
    pub fn new() -> Self {
        Running { flag: Arc::new(AtomicBool::new(true)), cancel: CancellationToken::new() }
    }

    pub fn is_running(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Returns true only for the call that actually stopped it.
    pub fn stop(&self) -> bool {
        let was_running = self.flag.swap(false, Ordering::AcqRel);
        self.cancel.cancel();
        was_running
    }

    pub fn stopped(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }
}

impl Default for Running {
    fn default() -> Self {
        Running::new()
    }
}
