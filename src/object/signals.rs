/*!
 * Signal Bits
 * Per-object state bitmask observed by waiters
 */

use bitflags::bitflags;

bitflags! {
    /// Signal bits carried by every kernel object
    ///
    /// The low bits are generic object states maintained by the kernel; the
    /// USER_* bits belong to userspace protocols and are only ever changed
    /// through user signaling.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Signals: u32 {
        const READABLE    = 1 << 0;
        const WRITABLE    = 1 << 1;
        const PEER_CLOSED = 1 << 2;
        const SIGNALED    = 1 << 3;

        // User signals
        const USER_0 = 1 << 24;
        const USER_1 = 1 << 25;
        const USER_2 = 1 << 26;
        const USER_3 = 1 << 27;
        const USER_4 = 1 << 28;
        const USER_5 = 1 << 29;
        const USER_6 = 1 << 30;
        const USER_7 = 1 << 31;

        /// Every bit user signaling may touch
        const USER_ALL = Self::USER_0.bits()
            | Self::USER_1.bits()
            | Self::USER_2.bits()
            | Self::USER_3.bits()
            | Self::USER_4.bits()
            | Self::USER_5.bits()
            | Self::USER_6.bits()
            | Self::USER_7.bits();
    }
}
