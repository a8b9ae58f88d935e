/*!
 * Interrupt-Safe Locking
 * Non-blocking lock for state shared with interrupt context
 */

/// Lock guarding state that interrupt-context code may touch
///
/// Paths entered from interrupt context must never park the calling thread,
/// so they take this spinlock instead of `parking_lot::Mutex`. Critical
/// sections under it stay short and never block: no allocation-heavy work,
/// no waiting on other events.
///
/// Lock order where both are held: interrupt spinlock first, then the port
/// queue lock.
pub type IrqSpinlock<T> = spin::Mutex<T>;
