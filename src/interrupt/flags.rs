/*!
 * Interrupt Flags
 * Creation and wait-behavior options for interrupt objects
 */

use bitflags::bitflags;

bitflags! {
    /// Options fixed at interrupt creation
    ///
    /// The two UNMASK_PREWAIT variants differ only in lock context: the
    /// plain one runs while the interrupt lock is held, the UNLOCKED one
    /// after it is dropped, for platforms whose unmask path may block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct InterruptFlags: u32 {
        /// Software-only interrupt: no platform line, fired by `trigger`
        const VIRTUAL = 1 << 0;
        /// Unmask the line before each blocking wait, under the lock
        const UNMASK_PREWAIT = 1 << 1;
        /// Unmask the line before each blocking wait, after dropping the lock
        const UNMASK_PREWAIT_UNLOCKED = 1 << 2;
        /// Mask the line in the handler once a delivery is made
        const MASK_POSTWAIT = 1 << 3;
    }
}
