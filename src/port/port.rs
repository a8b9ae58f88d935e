/*!
 * Port
 * Delivery queue consumed by waiter threads
 */

use super::packet::{InterruptPacket, PacketContents, PortPacket};
use crate::core::{IrqSpinlock, ObjectType, Timestamp};
use crate::object::{Dispatcher, KernelObject};
use log::trace;
use std::collections::VecDeque;
use std::sync::Arc;

enum QueueEntry {
    Signal(PortPacket),
    Interrupt(Arc<InterruptPacket>),
}

/// A queue of completion packets
///
/// Interrupt delivery paths enqueue while holding an interrupt spinlock, so
/// the queue lock is a spinlock too and critical sections stay short. Lock
/// order where both are held: interrupt spinlock first, then this lock.
pub struct PortDispatcher {
    dispatcher: Dispatcher,
    queue: IrqSpinlock<VecDeque<QueueEntry>>,
}

impl PortDispatcher {
    pub fn new() -> Arc<Self> {
        let port = Arc::new(Self {
            dispatcher: Dispatcher::new(ObjectType::Port),
            queue: IrqSpinlock::new(VecDeque::new()),
        });
        trace!("Created port koid {}", port.dispatcher.koid());
        port
    }

    /// Queue a signal completion
    ///
    /// Signal packets are one-shot records; every call appends.
    pub fn queue_packet(&self, packet: PortPacket) {
        self.queue.lock().push_back(QueueEntry::Signal(packet));
    }

    /// Queue an interrupt's reusable slot, stamping it with `timestamp`
    ///
    /// Returns false without touching the queue if the slot is already
    /// queued; the caller treats that as a coalesced delivery.
    pub fn queue_interrupt_packet(
        &self,
        packet: &Arc<InterruptPacket>,
        timestamp: Timestamp,
    ) -> bool {
        let mut queue = self.queue.lock();
        if packet.is_queued() {
            return false;
        }
        packet.set_timestamp(timestamp);
        packet.set_queued(true);
        queue.push_back(QueueEntry::Interrupt(packet.clone()));
        true
    }

    /// Pull a queued interrupt slot back out before it is delivered
    ///
    /// Returns true if the slot was still in the queue. False means a
    /// consumer already dequeued it (or it was never queued), in which case
    /// the packet is out of the port's hands.
    pub fn remove_interrupt_packet(&self, packet: &Arc<InterruptPacket>) -> bool {
        let mut queue = self.queue.lock();
        if !packet.is_queued() {
            return false;
        }
        queue.retain(|entry| match entry {
            QueueEntry::Interrupt(p) => !Arc::ptr_eq(p, packet),
            QueueEntry::Signal(_) => true,
        });
        packet.set_queued(false);
        true
    }

    /// Deliver the oldest pending packet to the consumer
    ///
    /// Dequeuing an interrupt packet releases its slot, so the interrupt may
    /// queue again before the consumer acknowledges.
    pub fn dequeue(&self) -> Option<PortPacket> {
        let mut queue = self.queue.lock();
        match queue.pop_front()? {
            QueueEntry::Signal(packet) => Some(packet),
            QueueEntry::Interrupt(slot) => {
                let packet = PortPacket {
                    key: slot.key(),
                    contents: PacketContents::Interrupt {
                        timestamp: slot.timestamp(),
                    },
                };
                slot.set_queued(false);
                Some(packet)
            }
        }
    }

    /// Number of packets waiting to be consumed
    pub fn queued_count(&self) -> usize {
        self.queue.lock().len()
    }
}

impl KernelObject for PortDispatcher {
    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}
