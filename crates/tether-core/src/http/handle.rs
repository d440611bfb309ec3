//! Cancellation handles for spawned requests

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

const PENDING: u8 = 0;
const DELIVERED: u8 = 1;
const CANCELLED: u8 = 2;

/// Shared completion state of one spawned request
///
/// Exactly one of delivery or cancellation wins.
#[derive(Debug, Clone, Default)]
pub(crate) struct Completion {
    state: Arc<AtomicU8>,
}

impl Completion {
    /// Claim the right to run the completion callback
    pub(crate) fn try_deliver(&self) -> bool {
        self.transition(DELIVERED)
    }

    fn try_cancel(&self) -> bool {
        self.transition(CANCELLED)
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(PENDING, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }

    fn is_delivered(&self) -> bool {
        self.state.load(Ordering::Acquire) == DELIVERED
    }
}

/// Handle to a request running in the background
///
/// Dropping the handle does not cancel the request.
#[derive(Debug)]
pub struct RequestHandle {
    completion: Completion,
    task: JoinHandle<()>,
}

impl RequestHandle {
    pub(crate) fn new(completion: Completion, task: JoinHandle<()>) -> Self {
        Self { completion, task }
    }

    /// Cancel the request
    ///
    /// Returns `true` if delivery had not been claimed yet. In that case the
    /// completion callback never runs and no further attempts are started.
    /// Once delivery is claimed, cancelling is a no-op returning `false`.
    pub fn cancel(&self) -> bool {
        if self.completion.try_cancel() {
            self.task.abort();
            true
        } else {
            false
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.completion.is_cancelled()
    }

    /// Whether delivery has been claimed
    ///
    /// The flag is set just before the completion callback is invoked, so
    /// the callback may still be running (or about to run) when this is true.
    pub fn is_delivered(&self) -> bool {
        self.completion.is_delivered()
    }

    /// Whether the background task has stopped
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the background task to stop, whether delivered or cancelled
    pub async fn join(self) {
        let _ = self.task.await;
    }
}
