/*!
 * Dispatcher
 * Signal state and observer lists shared by every kernel object
 */

use super::observer::{Disposition, SignalObserver, StateObserver};
use super::signals::Signals;
use crate::core::{alloc_koid, DispatchError, DispatchResult, HandleId, Koid, ObjectType, PacketKey};
use log::trace;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Signal-observer registration
///
/// The arming handle and mask live next to the observer so cancellation and
/// match scans never call into observer code while the lock is held.
struct SignalEntry {
    observer: Arc<dyn SignalObserver>,
    handle: HandleId,
    mask: Signals,
}

/// Mutable dispatcher state, all guarded by one lock
#[derive(Default)]
struct DispatchState {
    signals: Signals,
    observers: Vec<Arc<dyn StateObserver>>,
    signal_observers: Vec<SignalEntry>,
}

/// Per-object dispatch record: identity, handle count, signal bits, and the
/// observers watching them
///
/// One `Dispatcher` is embedded in every kernel object. All signal reads and
/// writes go through its lock. Callbacks that may re-enter dispatch code are
/// collected under the lock and fired only after it is released; callbacks
/// that run under the lock (the `StateObserver` disposition hooks) must not
/// call back in.
pub struct Dispatcher {
    koid: Koid,
    object_type: ObjectType,
    handle_count: AtomicU32,
    state: Mutex<DispatchState>,
}

impl Dispatcher {
    pub fn new(object_type: ObjectType) -> Self {
        Self::with_signals(object_type, Signals::empty())
    }

    /// Create with initial signal bits already set
    ///
    /// Used by object constructors that are born signaled; no observers can
    /// exist yet, so no notification round happens.
    pub fn with_signals(object_type: ObjectType, initial: Signals) -> Self {
        Self {
            koid: alloc_koid(),
            object_type,
            handle_count: AtomicU32::new(0),
            state: Mutex::new(DispatchState {
                signals: initial,
                ..DispatchState::default()
            }),
        }
    }

    pub fn koid(&self) -> Koid {
        self.koid
    }

    pub fn object_type(&self) -> ObjectType {
        self.object_type
    }

    /// Snapshot of the current signal bits
    pub fn poll_signals(&self) -> Signals {
        self.state.lock().signals
    }

    // ===== Handle accounting =====

    /// Note a new handle referring to this object; returns the new count
    pub fn increment_handle_count(&self) -> u32 {
        self.handle_count.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Note a handle going away; true when this was the last one
    pub fn decrement_handle_count(&self) -> bool {
        self.handle_count.fetch_sub(1, Ordering::SeqCst) == 1
    }

    pub fn handle_count(&self) -> u32 {
        self.handle_count.load(Ordering::SeqCst)
    }

    // ===== Signal updates =====

    /// Apply `clear` then `set` to the signal bits and notify observers
    ///
    /// A transition that leaves the bits unchanged runs no callbacks at all.
    /// State observers are consulted under the lock; matched signal observers
    /// and `Remove`-disposed state observers are unlinked first and notified
    /// once the lock is released.
    pub fn update_state(&self, clear: Signals, set: Signals) {
        let mut matched: Vec<(Arc<dyn SignalObserver>, Signals)> = Vec::new();
        let mut removed: Vec<Arc<dyn StateObserver>> = Vec::new();

        let mut state = self.state.lock();
        let new_signals = (state.signals - clear) | set;
        if new_signals == state.signals {
            return;
        }
        state.signals = new_signals;
        trace!("Koid {} signals now {:?}", self.koid, new_signals);

        let mut i = 0;
        while i < state.observers.len() {
            match state.observers[i].on_state_change(new_signals) {
                Disposition::Keep => i += 1,
                Disposition::Remove => removed.push(state.observers.swap_remove(i)),
            }
        }

        // Signal observers are one-shot: any masked bit set is a match.
        let mut j = 0;
        while j < state.signal_observers.len() {
            if state.signal_observers[j].mask.intersects(new_signals) {
                let entry = state.signal_observers.swap_remove(j);
                matched.push((entry.observer, new_signals));
            } else {
                j += 1;
            }
        }
        drop(state);

        for observer in removed {
            observer.on_removed();
        }
        for (observer, observed) in matched {
            observer.on_match(observed);
        }
    }

    // ===== Lifecycle observers =====

    /// Attach a lifecycle observer
    ///
    /// `on_initialize` runs under the lock with the current signal state. An
    /// immediate `Remove` disposition means the observer is never linked;
    /// `on_removed` still fires for it.
    pub fn add_observer(&self, observer: Arc<dyn StateObserver>) -> DispatchResult<()> {
        if !self.object_type.is_waitable() {
            return Err(DispatchError::NotSupported);
        }

        let mut state = self.state.lock();
        match observer.on_initialize(state.signals) {
            Disposition::Keep => {
                state.observers.push(observer);
            }
            Disposition::Remove => {
                drop(state);
                observer.on_removed();
            }
        }
        Ok(())
    }

    /// Detach a lifecycle observer by identity; true if it was linked
    ///
    /// No callback fires: the caller owns the record and is synchronously
    /// done with it.
    pub fn remove_observer(&self, observer: &Arc<dyn StateObserver>) -> bool {
        let mut state = self.state.lock();
        let before = state.observers.len();
        state.observers.retain(|o| !Arc::ptr_eq(o, observer));
        before != state.observers.len()
    }

    // ===== Signal observers =====

    /// Arm a one-shot signal observer for `mask`, scoped to `handle`
    ///
    /// If a masked bit is already set, the observer matches immediately and
    /// is never linked.
    pub fn add_signal_observer(
        &self,
        observer: Arc<dyn SignalObserver>,
        handle: HandleId,
        mask: Signals,
    ) -> DispatchResult<()> {
        if !self.object_type.is_waitable() {
            return Err(DispatchError::NotSupported);
        }

        let mut state = self.state.lock();
        if state.signals.intersects(mask) {
            let observed = state.signals;
            drop(state);
            observer.on_match(observed);
            return Ok(());
        }
        state.signal_observers.push(SignalEntry {
            observer,
            handle,
            mask,
        });
        Ok(())
    }

    /// Disarm a signal observer by identity
    ///
    /// Returns whether it was still linked (false once it has fired or was
    /// canceled) together with the current signal snapshot, so a caller
    /// racing a match can tell what the waiter observed.
    pub fn remove_signal_observer(
        &self,
        observer: &Arc<dyn SignalObserver>,
    ) -> (bool, Signals) {
        let mut state = self.state.lock();
        let before = state.signal_observers.len();
        state
            .signal_observers
            .retain(|e| !Arc::ptr_eq(&e.observer, observer));
        (before != state.signal_observers.len(), state.signals)
    }

    // ===== Cancellation =====

    /// Cancel every wait riding on `handle`
    ///
    /// Runs whenever a handle to this object is closed. Signal observers
    /// armed through the handle are unlinked and get `on_cancel`; state
    /// observers choose their own disposition.
    pub fn cancel(&self, handle: HandleId) {
        let mut canceled: Vec<(Arc<dyn SignalObserver>, Signals)> = Vec::new();
        let mut removed: Vec<Arc<dyn StateObserver>> = Vec::new();

        let mut state = self.state.lock();
        let observed = state.signals;

        let mut i = 0;
        while i < state.observers.len() {
            match state.observers[i].on_cancel(handle) {
                Disposition::Keep => i += 1,
                Disposition::Remove => removed.push(state.observers.swap_remove(i)),
            }
        }

        let mut j = 0;
        while j < state.signal_observers.len() {
            if state.signal_observers[j].handle == handle {
                let entry = state.signal_observers.swap_remove(j);
                canceled.push((entry.observer, observed));
            } else {
                j += 1;
            }
        }
        drop(state);

        for observer in removed {
            observer.on_removed();
        }
        for (observer, observed) in canceled {
            observer.on_cancel(observed);
        }
    }

    /// Cancel the signal observers armed for one (port, key) wait on `handle`
    ///
    /// Only signal observers carry a port/key pair, so state observers are
    /// never touched. Returns true if at least one wait was canceled.
    pub fn cancel_by_key(&self, handle: HandleId, port: Koid, key: PacketKey) -> bool {
        let mut canceled: Vec<(Arc<dyn SignalObserver>, Signals)> = Vec::new();

        let mut state = self.state.lock();
        let observed = state.signals;
        let mut i = 0;
        while i < state.signal_observers.len() {
            let entry = &state.signal_observers[i];
            if entry.handle == handle && entry.observer.matches_key(port, key) {
                let entry = state.signal_observers.swap_remove(i);
                canceled.push((entry.observer, observed));
            } else {
                i += 1;
            }
        }
        drop(state);

        let any = !canceled.is_empty();
        for (observer, observed) in canceled {
            observer.on_cancel(observed);
        }
        any
    }
}

impl Drop for Dispatcher {
    /// Tear down observers still linked when the object goes away, so their
    /// waiters learn the wait will never complete instead of hanging
    fn drop(&mut self) {
        let state = self.state.get_mut();
        let observed = state.signals;
        let observers = std::mem::take(&mut state.observers);
        let signal_observers = std::mem::take(&mut state.signal_observers);

        for observer in observers {
            observer.on_removed();
        }
        for entry in signal_observers {
            entry.observer.on_cancel(observed);
        }
    }
}

/// Implemented by every kernel object embedding a `Dispatcher`
pub trait KernelObject: Send + Sync {
    /// The object's dispatch record
    fn dispatcher(&self) -> &Dispatcher;

    /// Hook invoked after the last handle to the object is closed
    fn on_zero_handles(&self) {}
}
