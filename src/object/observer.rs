/*!
 * Observer Traits
 * Wait hooks attached to dispatchers
 */

use super::signals::Signals;
use crate::core::{HandleId, Koid, PacketKey};

/// What a lifecycle callback tells the dispatcher to do with a registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Stay linked and keep receiving state changes
    Keep,
    /// Unlink now; `on_removed` fires once the object lock is released
    Remove,
}

/// Lifecycle observer used to build multi-object waits
///
/// `on_initialize`, `on_state_change`, and `on_cancel` run under the object
/// lock: they must be quick and must not call back into any dispatcher.
/// `on_removed` runs after the observer was unlinked, outside the lock, and
/// may re-enter freely.
pub trait StateObserver: Send + Sync {
    /// Called at attach time with the object's current signal state
    fn on_initialize(&self, initial: Signals) -> Disposition;

    /// Called on every signal transition while linked
    fn on_state_change(&self, new_state: Signals) -> Disposition;

    /// Called when a handle to the observed object is being closed
    ///
    /// Return `Remove` to be unlinked as part of cancellation, `Keep` if the
    /// wait does not ride on that particular handle.
    fn on_cancel(&self, handle: HandleId) -> Disposition;

    /// Final callback after leaving the list
    fn on_removed(&self) {}
}

/// One-shot observer backing asynchronous signal waits
///
/// Armed with a signal mask, it fires exactly once: `on_match` when a masked
/// bit is (or becomes) set, or `on_cancel` when the arming handle closes or
/// the object is torn down first. Both callbacks run after the observer was
/// unlinked, outside the object lock, and may re-enter the dispatcher.
pub trait SignalObserver: Send + Sync {
    /// The wait completed; `observed` is the full signal state at match time
    fn on_match(&self, observed: Signals);

    /// The wait will never complete; `observed` is the state at cancel time
    fn on_cancel(&self, observed: Signals);

    /// Key-scoped cancellation hook
    ///
    /// Observers armed on behalf of a port wait report the (port koid, key)
    /// pair they carry so `cancel_by_key` can single them out. Everything
    /// else stays invisible to key-scoped cancellation.
    fn matches_key(&self, _port: Koid, _key: PacketKey) -> bool {
        false
    }
}
