//! Single-task worker offload
//!
//! Each removal runs on its own named worker thread and the caller blocks
//! until it finishes. At most one task is in flight per runner; a second
//! submission while one is running is refused rather than queued.

use crate::error::{BgRemovalError, Result};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error};

const WORKER_THREAD_NAME: &str = "bgremove-worker";

/// Runs one task at a time on a dedicated worker thread
#[derive(Debug, Default)]
pub struct TaskRunner {
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the task ends, even by panic
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl TaskRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a task is currently running
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Run `task` on a worker thread and wait for its result
    ///
    /// # Errors
    /// - [`BgRemovalError::TaskBusy`] if another task is still running
    /// - [`BgRemovalError::Task`] if the worker cannot be spawned or panics
    pub fn run<T, F>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BgRemovalError::TaskBusy);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(task)
            .map_err(|e| BgRemovalError::task(format!("failed to spawn worker thread: {e}")))?;
        debug!(thread = WORKER_THREAD_NAME, "Removal task submitted");

        handle.join().map_err(|payload| {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "Removal worker panicked");
            BgRemovalError::task(format!("worker thread panicked: {message}"))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
