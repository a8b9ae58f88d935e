/*!
 * Event Object
 * Minimal waitable object carrying user-controlled signal bits
 */

use super::dispatcher::{Dispatcher, KernelObject};
use super::signals::Signals;
use crate::core::{DispatchError, DispatchResult, ObjectType};
use std::sync::Arc;

/// The canonical waitable object: nothing but signal bits
///
/// Events let userspace build its own wait protocols: SIGNALED and the
/// USER_* bits are flipped through `user_signal`, and observers attached to
/// the event see every transition.
pub struct EventDispatcher {
    dispatcher: Dispatcher,
}

impl EventDispatcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dispatcher: Dispatcher::new(ObjectType::Event),
        })
    }

    /// Set and clear user-visible signal bits
    ///
    /// Only SIGNALED and the USER_* bits may be touched this way; anything
    /// else is the kernel's to maintain.
    pub fn user_signal(&self, clear: Signals, set: Signals) -> DispatchResult<()> {
        let allowed = Signals::USER_ALL | Signals::SIGNALED;
        if !allowed.contains(clear | set) {
            return Err(DispatchError::InvalidArgs);
        }
        self.dispatcher.update_state(clear, set);
        Ok(())
    }
}

impl KernelObject for EventDispatcher {
    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_signal_flips_allowed_bits() {
        let event = EventDispatcher::new();
        event
            .user_signal(Signals::empty(), Signals::SIGNALED | Signals::USER_3)
            .unwrap();
        assert_eq!(
            event.dispatcher().poll_signals(),
            Signals::SIGNALED | Signals::USER_3
        );

        event.user_signal(Signals::USER_3, Signals::empty()).unwrap();
        assert_eq!(event.dispatcher().poll_signals(), Signals::SIGNALED);
    }

    #[test]
    fn test_user_signal_rejects_kernel_bits() {
        let event = EventDispatcher::new();
        let err = event
            .user_signal(Signals::empty(), Signals::PEER_CLOSED)
            .unwrap_err();
        assert_eq!(err, DispatchError::InvalidArgs);
        assert_eq!(event.dispatcher().poll_signals(), Signals::empty());
    }
}
