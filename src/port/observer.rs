/*!
 * Port Observer
 * Bridges one-shot signal waits into port packet delivery
 */

use super::packet::{PacketContents, PortPacket};
use super::port::PortDispatcher;
use crate::core::{Koid, PacketKey};
use crate::object::{KernelObject, SignalObserver, Signals};
use std::sync::Arc;

/// Signal observer that completes by queueing a packet on a port
///
/// One of these backs each async wait: armed on an object through
/// `add_signal_observer`, it queues a `Signal` packet carrying the waiter's
/// key when the wait matches. A canceled wait delivers nothing; the waiter
/// learns about cancellation from whoever closed the handle, not from the
/// port.
pub struct PortObserver {
    port: Arc<PortDispatcher>,
    key: PacketKey,
    trigger: Signals,
}

impl PortObserver {
    pub fn new(port: Arc<PortDispatcher>, key: PacketKey, trigger: Signals) -> Arc<Self> {
        Arc::new(Self { port, key, trigger })
    }

    pub fn key(&self) -> PacketKey {
        self.key
    }

    /// The mask this wait was armed with
    pub fn trigger(&self) -> Signals {
        self.trigger
    }
}

impl SignalObserver for PortObserver {
    fn on_match(&self, observed: Signals) {
        self.port.queue_packet(PortPacket {
            key: self.key,
            contents: PacketContents::Signal {
                trigger: self.trigger,
                observed,
            },
        });
    }

    fn on_cancel(&self, _observed: Signals) {}

    fn matches_key(&self, port: Koid, key: PacketKey) -> bool {
        self.port.dispatcher().koid() == port && self.key == key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{HandleId, ObjectType};
    use crate::object::Dispatcher;

    #[test]
    fn test_match_queues_packet_with_key() {
        let port = PortDispatcher::new();
        let object = Dispatcher::new(ObjectType::Event);
        let observer = PortObserver::new(port.clone(), 77, Signals::SIGNALED);

        object
            .add_signal_observer(observer.clone(), HandleId(1), observer.trigger())
            .unwrap();
        object.update_state(Signals::empty(), Signals::SIGNALED | Signals::READABLE);

        let packet = port.dequeue().unwrap();
        assert_eq!(packet.key, 77);
        assert_eq!(
            packet.contents,
            PacketContents::Signal {
                trigger: Signals::SIGNALED,
                observed: Signals::SIGNALED | Signals::READABLE,
            }
        );
    }

    #[test]
    fn test_cancel_delivers_nothing() {
        let port = PortDispatcher::new();
        let object = Dispatcher::new(ObjectType::Event);
        let observer = PortObserver::new(port.clone(), 77, Signals::SIGNALED);

        object
            .add_signal_observer(observer, HandleId(1), Signals::SIGNALED)
            .unwrap();
        object.cancel(HandleId(1));

        assert_eq!(port.dequeue(), None);
    }

    #[test]
    fn test_cancel_by_key_finds_port_wait() {
        let port = PortDispatcher::new();
        let other_port = PortDispatcher::new();
        let object = Dispatcher::new(ObjectType::Event);

        object
            .add_signal_observer(
                PortObserver::new(port.clone(), 5, Signals::SIGNALED),
                HandleId(1),
                Signals::SIGNALED,
            )
            .unwrap();

        // Wrong port, wrong key, wrong handle: the wait stays armed
        assert!(!object.cancel_by_key(HandleId(1), other_port.dispatcher().koid(), 5));
        assert!(!object.cancel_by_key(HandleId(1), port.dispatcher().koid(), 6));
        assert!(!object.cancel_by_key(HandleId(2), port.dispatcher().koid(), 5));

        assert!(object.cancel_by_key(HandleId(1), port.dispatcher().koid(), 5));
        object.update_state(Signals::empty(), Signals::SIGNALED);
        assert_eq!(port.dequeue(), None);
    }
}
