/*!
 * Synchronization Primitives
 *
 * The two locking disciplines of the dispatch layer:
 * - `KernelEvent`: a blocking, auto-reset completion event for threads
 *   waiting on an object (parking_lot mutex + condvar underneath)
 * - `IrqSpinlock`: a non-blocking lock for state that interrupt-context
 *   code may touch
 *
 * # Architecture
 *
 * Blocking is confined to `KernelEvent::wait`. The event's internal mutex
 * is a leaf lock: `signal`/`interrupt`/`clear` hold it only for a bounded
 * store-and-notify and may run under an `IrqSpinlock` guard, while `wait`
 * (the only parking path) is entered with no other lock held.
 */

mod event;
mod spinlock;

pub use event::KernelEvent;
pub use spinlock::IrqSpinlock;
