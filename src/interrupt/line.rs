/*!
 * Interrupt Line
 * Platform seam for masking and routing a hardware interrupt
 */

/// Control surface of one hardware interrupt line
///
/// Implemented by platform interrupt controllers. `mask` and `unmask` may be
/// called while an interrupt spinlock is held and must not block; platforms
/// whose unmask path can block should be used with
/// `UNMASK_PREWAIT_UNLOCKED`, which moves the call outside the lock.
pub trait InterruptLine: Send + Sync {
    /// Suppress delivery on this line
    fn mask(&self);

    /// Re-enable delivery on this line
    fn unmask(&self);

    /// Detach the dispatcher's handler from this line
    ///
    /// Called during destroy, possibly more than once; must be idempotent.
    /// After it returns the platform no longer invokes `interrupt_handler`
    /// for this object.
    fn unregister(&self);
}

/// A line with no controller behind it
///
/// Stands in where interrupt plumbing is exercised without hardware.
pub struct NullLine;

impl InterruptLine for NullLine {
    fn mask(&self) {}
    fn unmask(&self) {}
    fn unregister(&self) {}
}
