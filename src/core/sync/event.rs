/*!
 * Kernel Event
 * Auto-reset completion event carrying a status payload
 */

use crate::core::errors::{DispatchError, DispatchResult};
use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct EventState {
    completion: Option<DispatchResult<()>>,
    interrupted: bool,
}

/// Auto-reset event used to park a thread until a completion arrives
///
/// `signal` posts a completion status and wakes one waiter; the waiter
/// consumes the status, leaving the event clear for the next round. A later
/// `signal` overwrites an unconsumed one: the payload is a status, not a
/// queue. `interrupt` wakes a waiter without posting a completion, which
/// surfaces to the waiter as `InterruptedRetry`.
pub struct KernelEvent {
    state: Mutex<EventState>,
    condvar: Condvar,
}

impl KernelEvent {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EventState::default()),
            condvar: Condvar::new(),
        }
    }

    /// Post a completion status and wake one waiter
    pub fn signal(&self, status: DispatchResult<()>) {
        let mut state = self.state.lock();
        state.completion = Some(status);
        drop(state);
        self.condvar.notify_one();
    }

    /// Discard an unconsumed completion, leaving the event unsignaled
    ///
    /// Used when a delivery is consumed through a fast path that never
    /// touched the event, so a stale completion does not wake the next
    /// waiter. A pending interruption is left alone.
    pub fn clear(&self) {
        self.state.lock().completion = None;
    }

    /// Wake one waiter without posting a completion
    ///
    /// Used by the thread layer to pull a sleeper off the event without
    /// deciding the outcome of its wait (suspension, shutdown). The waiter
    /// observes `InterruptedRetry` and is expected to re-issue the wait.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        state.interrupted = true;
        drop(state);
        self.condvar.notify_one();
    }

    /// Block until a completion or interruption arrives, consuming it
    ///
    /// A completion posted before the wait is consumed immediately. When a
    /// completion and an interruption are both pending, the completion wins.
    pub fn wait(&self) -> DispatchResult<()> {
        let mut state = self.state.lock();
        loop {
            if let Some(status) = state.completion.take() {
                return status;
            }
            if state.interrupted {
                state.interrupted = false;
                return Err(DispatchError::InterruptedRetry);
            }
            self.condvar.wait(&mut state);
        }
    }
}

impl Default for KernelEvent {
    fn default() -> Self {
        Self::new()
    }
}
