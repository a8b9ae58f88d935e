/*!
 * Interrupt Dispatcher
 * Interrupt objects: one line, one consumer, five lifecycle states
 */

use super::flags::InterruptFlags;
use super::line::InterruptLine;
use crate::core::{
    current_ticks, DispatchError, DispatchResult, IrqSpinlock, KernelEvent, ObjectType, PacketKey,
    Timestamp,
};
use crate::object::{Dispatcher, KernelObject};
use crate::port::{InterruptPacket, PortDispatcher};
use log::debug;
use std::sync::Arc;

/// Lifecycle of an interrupt object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptState {
    /// Nothing pending, nobody waiting
    Idle,
    /// A thread is blocked in `wait_for_interrupt`
    Waiting,
    /// Fired with no port bound; the next wait completes immediately
    Triggered,
    /// Delivered; no further delivery until acknowledged
    NeedAck,
    /// Torn down; terminal
    Destroyed,
}

/// State guarded by the interrupt spinlock
struct Inner {
    state: InterruptState,
    /// Pending firing time; zero when none is recorded
    timestamp: Timestamp,
    port: Option<Arc<PortDispatcher>>,
    vcpu_bound: bool,
    flags: InterruptFlags,
}

/// An interrupt object
///
/// Deliveries reach the consumer one of two ways: a thread blocked in
/// `wait_for_interrupt`, or a packet queued to a bound port. Either way the
/// consumer owes an acknowledgment (re-waiting, or `ack`) before the next
/// delivery is made; triggers arriving in between are coalesced down to one
/// pending timestamp.
///
/// `interrupt_handler` and `trigger` may run in interrupt context, so the
/// object's own state sits under a spinlock and the blocking machinery is
/// confined to the `KernelEvent`.
pub struct InterruptDispatcher {
    dispatcher: Dispatcher,
    line: Option<Arc<dyn InterruptLine>>,
    packet: Arc<InterruptPacket>,
    event: KernelEvent,
    inner: IrqSpinlock<Inner>,
}

impl core::fmt::Debug for InterruptDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InterruptDispatcher").finish_non_exhaustive()
    }
}

impl InterruptDispatcher {
    /// Create a software interrupt with no platform line
    pub fn new_virtual() -> Arc<Self> {
        Self::build(InterruptFlags::VIRTUAL, None)
    }

    /// Create an interrupt wired to a platform line
    pub fn new_physical(
        line: Arc<dyn InterruptLine>,
        flags: InterruptFlags,
    ) -> DispatchResult<Arc<Self>> {
        if flags.contains(InterruptFlags::VIRTUAL) {
            return Err(DispatchError::InvalidArgs);
        }
        Ok(Self::build(flags, Some(line)))
    }

    fn build(flags: InterruptFlags, line: Option<Arc<dyn InterruptLine>>) -> Arc<Self> {
        Arc::new(Self {
            dispatcher: Dispatcher::new(ObjectType::Interrupt),
            line,
            packet: Arc::new(InterruptPacket::new()),
            event: KernelEvent::new(),
            inner: IrqSpinlock::new(Inner {
                state: InterruptState::Idle,
                timestamp: 0,
                port: None,
                vcpu_bound: false,
                flags,
            }),
        })
    }

    pub fn flags(&self) -> InterruptFlags {
        self.inner.lock().flags
    }

    /// Replace the mask/unmask policy bits
    ///
    /// Configuration happens before the interrupt is used: rejected with
    /// `BadState` once a wait, a binding, or a delivery is in progress, and
    /// with `InvalidArgs` if the VIRTUAL bit would change, since virtual and
    /// physical interrupts are different objects from birth.
    pub fn set_flags(&self, flags: InterruptFlags) -> DispatchResult<()> {
        let mut inner = self.inner.lock();
        if flags.contains(InterruptFlags::VIRTUAL) != inner.flags.contains(InterruptFlags::VIRTUAL)
        {
            return Err(DispatchError::InvalidArgs);
        }
        if inner.state != InterruptState::Idle || inner.port.is_some() || inner.vcpu_bound {
            return Err(DispatchError::BadState);
        }
        inner.flags = flags;
        Ok(())
    }

    /// Current lifecycle state
    pub fn state(&self) -> InterruptState {
        self.inner.lock().state
    }

    fn mask_line(&self) {
        if let Some(line) = &self.line {
            line.mask();
        }
    }

    fn unmask_line(&self) {
        if let Some(line) = &self.line {
            line.unmask();
        }
    }

    /// Queue the packet stamped with the pending timestamp
    ///
    /// The timestamp is consumed only when the queue accepts; on a duplicate
    /// it stays pending for the eventual ack to deliver.
    fn send_packet_locked(&self, inner: &mut Inner) -> bool {
        let port = match inner.port.clone() {
            Some(port) => port,
            None => return false,
        };
        if port.queue_interrupt_packet(&self.packet, inner.timestamp) {
            inner.timestamp = 0;
            true
        } else {
            false
        }
    }

    // ===== Delivery paths =====

    /// Platform entry point: the line fired
    ///
    /// Runs in interrupt context; takes only the spinlock. Records the
    /// firing time if none is pending, then delivers through the bound port
    /// or wakes the blocked waiter.
    pub fn interrupt_handler(&self) {
        let mut inner = self.inner.lock();
        if inner.state == InterruptState::Destroyed {
            return;
        }
        if inner.timestamp == 0 {
            inner.timestamp = current_ticks();
        }
        if inner.port.is_some() {
            if inner.state != InterruptState::NeedAck {
                self.send_packet_locked(&mut inner);
                inner.state = InterruptState::NeedAck;
            }
            // NeedAck: the pending timestamp waits for the ack
        } else {
            inner.state = InterruptState::Triggered;
            self.event.signal(Ok(()));
            if inner.flags.contains(InterruptFlags::MASK_POSTWAIT) {
                self.mask_line();
            }
        }
    }

    /// Software trigger for virtual interrupts
    ///
    /// `timestamp` is recorded only if none is pending, so coalesced
    /// triggers keep the first firing time.
    pub fn trigger(&self, timestamp: Timestamp) -> DispatchResult<()> {
        let mut inner = self.inner.lock();
        if !inner.flags.contains(InterruptFlags::VIRTUAL) {
            return Err(DispatchError::BadState);
        }
        if inner.timestamp == 0 {
            inner.timestamp = timestamp;
        }
        match inner.state {
            InterruptState::Destroyed => return Err(DispatchError::Canceled),
            // Already pending for a waiter; this firing was coalesced above
            InterruptState::Triggered => return Ok(()),
            _ => {}
        }
        if inner.port.is_some() {
            if inner.state != InterruptState::NeedAck {
                self.send_packet_locked(&mut inner);
                inner.state = InterruptState::NeedAck;
            }
        } else {
            inner.state = InterruptState::Triggered;
            self.event.signal(Ok(()));
        }
        Ok(())
    }

    // ===== Thread-side wait =====

    /// Block until the interrupt fires, returning the firing time
    ///
    /// Re-waiting is how a thread-side consumer acknowledges the previous
    /// delivery: entering from NeedAck applies the unmask policy and re-arms
    /// delivery. Port-bound interrupts cannot be waited on.
    pub fn wait_for_interrupt(&self) -> DispatchResult<Timestamp> {
        loop {
            let mut defer_unmask = false;
            {
                let mut inner = self.inner.lock();
                if inner.port.is_some() || inner.vcpu_bound {
                    return Err(DispatchError::BadState);
                }
                match inner.state {
                    InterruptState::Destroyed => return Err(DispatchError::Canceled),
                    InterruptState::Triggered => {
                        inner.state = InterruptState::NeedAck;
                        let timestamp = std::mem::replace(&mut inner.timestamp, 0);
                        // Consume the stale completion so the next wait blocks
                        self.event.clear();
                        return Ok(timestamp);
                    }
                    InterruptState::NeedAck => {
                        if inner.flags.contains(InterruptFlags::UNMASK_PREWAIT) {
                            self.unmask_line();
                        } else if inner.flags.contains(InterruptFlags::UNMASK_PREWAIT_UNLOCKED) {
                            defer_unmask = true;
                        }
                    }
                    // A second waiter landing on Waiting blocks like the first
                    InterruptState::Idle | InterruptState::Waiting => {}
                }
                inner.state = InterruptState::Waiting;
            }

            if defer_unmask {
                self.unmask_line();
            }

            if let Err(err) = self.event.wait() {
                // Interrupted or canceled without a delivery; put the state
                // machine back unless something terminal happened meanwhile.
                let mut inner = self.inner.lock();
                if inner.state == InterruptState::Waiting {
                    inner.state = InterruptState::Idle;
                }
                return Err(err);
            }
        }
    }

    /// Acknowledge a port delivery, re-arming the interrupt
    ///
    /// If another firing arrived since the packet was handed out, its
    /// pending timestamp is queued immediately and the object stays in
    /// NeedAck; otherwise it returns to Idle.
    pub fn ack(&self) -> DispatchResult<()> {
        let mut defer_unmask = false;
        {
            let mut inner = self.inner.lock();
            if inner.port.is_none() {
                return Err(DispatchError::BadState);
            }
            if inner.state == InterruptState::Destroyed {
                return Err(DispatchError::Canceled);
            }
            if inner.state == InterruptState::NeedAck {
                if inner.flags.contains(InterruptFlags::UNMASK_PREWAIT) {
                    self.unmask_line();
                } else if inner.flags.contains(InterruptFlags::UNMASK_PREWAIT_UNLOCKED) {
                    defer_unmask = true;
                }
                if inner.timestamp != 0 {
                    if !self.send_packet_locked(&mut inner) {
                        // The previous packet is still sitting in the queue;
                        // an ack at this point is out of protocol. The unmask
                        // was already owed, so both policies apply it here.
                        drop(inner);
                        if defer_unmask {
                            self.unmask_line();
                        }
                        return Err(DispatchError::BadState);
                    }
                } else {
                    inner.state = InterruptState::Idle;
                }
            }
        }
        if defer_unmask {
            self.unmask_line();
        }
        Ok(())
    }

    // ===== Port binding =====

    /// Route deliveries to `port`, stamping packets with `key`
    ///
    /// A firing that predates the bind is delivered immediately.
    pub fn bind(&self, port: Arc<PortDispatcher>, key: PacketKey) -> DispatchResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            InterruptState::Destroyed => return Err(DispatchError::Canceled),
            InterruptState::Waiting => return Err(DispatchError::BadState),
            _ => {}
        }
        if inner.port.is_some() || inner.vcpu_bound {
            return Err(DispatchError::AlreadyBound);
        }
        // Once port-bound, masking belongs to the wait/ack protocol; an
        // unlocked unmask cannot be combined with handler-side masking.
        if inner.flags.contains(InterruptFlags::UNMASK_PREWAIT_UNLOCKED)
            && inner.flags.contains(InterruptFlags::MASK_POSTWAIT)
        {
            return Err(DispatchError::InvalidArgs);
        }

        self.packet.set_key(key);
        inner.port = Some(port);

        if inner.state == InterruptState::Triggered {
            self.send_packet_locked(&mut inner);
            inner.state = InterruptState::NeedAck;
        }
        debug!("Interrupt koid {} bound to port", self.dispatcher.koid());
        Ok(())
    }

    /// Detach from `port`, withdrawing any undelivered packet
    ///
    /// The pending timestamp is discarded and the object returns to Idle, so
    /// a later bind starts clean.
    pub fn unbind(&self, port: &Arc<PortDispatcher>) -> DispatchResult<()> {
        let mut inner = self.inner.lock();
        let bound_here = match &inner.port {
            Some(current) => Arc::ptr_eq(current, port),
            None => false,
        };
        if !bound_here {
            return Err(DispatchError::NotFound);
        }
        if inner.state == InterruptState::Destroyed {
            return Err(DispatchError::Canceled);
        }

        port.remove_interrupt_packet(&self.packet);
        inner.port = None;
        inner.timestamp = 0;
        inner.state = InterruptState::Idle;
        debug!("Interrupt koid {} unbound from port", self.dispatcher.koid());
        Ok(())
    }

    /// Reserve the interrupt for direct vcpu injection
    ///
    /// Mutually exclusive with port binding. The injection machinery lives
    /// with the hypervisor; the dispatcher only polices the binding.
    pub fn attach_vcpu(&self) -> DispatchResult<()> {
        let mut inner = self.inner.lock();
        match inner.state {
            InterruptState::Destroyed => return Err(DispatchError::Canceled),
            InterruptState::Waiting => return Err(DispatchError::BadState),
            _ => {}
        }
        if inner.port.is_some() {
            return Err(DispatchError::AlreadyBound);
        }
        inner.vcpu_bound = true;
        Ok(())
    }

    /// Release the vcpu reservation
    pub fn detach_vcpu(&self) -> DispatchResult<()> {
        let mut inner = self.inner.lock();
        if inner.state == InterruptState::Destroyed {
            return Err(DispatchError::Canceled);
        }
        if !inner.vcpu_bound {
            return Err(DispatchError::NotFound);
        }
        inner.vcpu_bound = false;
        Ok(())
    }

    // ===== Teardown =====

    /// Tear the interrupt down; terminal and idempotent
    ///
    /// Returns NotFound when a consumer was handed a packet it has not
    /// acknowledged; the object is Destroyed regardless. With no port bound
    /// the blocked waiter (if any) is woken with Canceled.
    pub fn destroy(&self) -> DispatchResult<()> {
        // Quiesce the line before touching the state machine. A firing that
        // sneaks in between observes Destroyed and goes nowhere.
        self.mask_line();
        if let Some(line) = &self.line {
            line.unregister();
        }

        let mut inner = self.inner.lock();
        if inner.state == InterruptState::Destroyed {
            return Ok(());
        }
        match inner.port.clone() {
            Some(port) => {
                let was_queued = port.remove_interrupt_packet(&self.packet);
                let ack_owed = inner.state == InterruptState::NeedAck && !was_queued;
                inner.state = InterruptState::Destroyed;
                if ack_owed {
                    // A consumer holds the packet; it finds out at ack time
                    return Err(DispatchError::NotFound);
                }
                Ok(())
            }
            None => {
                inner.state = InterruptState::Destroyed;
                self.event.signal(Err(DispatchError::Canceled));
                Ok(())
            }
        }
    }
}

impl KernelObject for InterruptDispatcher {
    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Closing the last handle destroys the interrupt
    fn on_zero_handles(&self) {
        let _ = self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupt::line::NullLine;

    #[test]
    fn test_trigger_requires_virtual() {
        let irq =
            InterruptDispatcher::new_physical(Arc::new(NullLine), InterruptFlags::empty())
                .unwrap();
        assert_eq!(irq.trigger(1), Err(DispatchError::BadState));
    }

    #[test]
    fn test_physical_rejects_virtual_flag() {
        let err = InterruptDispatcher::new_physical(Arc::new(NullLine), InterruptFlags::VIRTUAL)
            .unwrap_err();
        assert_eq!(err, DispatchError::InvalidArgs);
    }

    #[test]
    fn test_trigger_then_wait_fast_path() {
        let irq = InterruptDispatcher::new_virtual();
        irq.trigger(42).unwrap();
        assert_eq!(irq.state(), InterruptState::Triggered);

        assert_eq!(irq.wait_for_interrupt(), Ok(42));
        assert_eq!(irq.state(), InterruptState::NeedAck);
    }

    #[test]
    fn test_coalesced_triggers_keep_first_timestamp() {
        let irq = InterruptDispatcher::new_virtual();
        irq.trigger(100).unwrap();
        irq.trigger(200).unwrap();
        assert_eq!(irq.wait_for_interrupt(), Ok(100));
    }

    #[test]
    fn test_wait_rejected_while_port_bound() {
        let irq = InterruptDispatcher::new_virtual();
        irq.bind(PortDispatcher::new(), 1).unwrap();
        assert_eq!(irq.wait_for_interrupt(), Err(DispatchError::BadState));
    }

    #[test]
    fn test_second_bind_already_bound() {
        let irq = InterruptDispatcher::new_virtual();
        irq.bind(PortDispatcher::new(), 1).unwrap();
        assert_eq!(
            irq.bind(PortDispatcher::new(), 2),
            Err(DispatchError::AlreadyBound)
        );
    }

    #[test]
    fn test_bind_after_vcpu_already_bound() {
        let irq = InterruptDispatcher::new_virtual();
        irq.attach_vcpu().unwrap();
        assert_eq!(
            irq.bind(PortDispatcher::new(), 1),
            Err(DispatchError::AlreadyBound)
        );
        assert_eq!(irq.wait_for_interrupt(), Err(DispatchError::BadState));

        // Detaching clears the way for a port binding
        irq.detach_vcpu().unwrap();
        assert_eq!(irq.detach_vcpu(), Err(DispatchError::NotFound));
        irq.bind(PortDispatcher::new(), 1).unwrap();
    }

    #[test]
    fn test_set_flags_before_use_only() {
        let irq =
            InterruptDispatcher::new_physical(Arc::new(NullLine), InterruptFlags::empty())
                .unwrap();
        irq.set_flags(InterruptFlags::UNMASK_PREWAIT).unwrap();
        assert_eq!(irq.flags(), InterruptFlags::UNMASK_PREWAIT);

        // The VIRTUAL bit is fixed at creation
        assert_eq!(
            irq.set_flags(InterruptFlags::VIRTUAL),
            Err(DispatchError::InvalidArgs)
        );

        let bound = InterruptDispatcher::new_virtual();
        bound.bind(PortDispatcher::new(), 1).unwrap();
        assert_eq!(
            bound.set_flags(InterruptFlags::VIRTUAL | InterruptFlags::UNMASK_PREWAIT),
            Err(DispatchError::BadState)
        );
    }

    #[test]
    fn test_bind_rejects_conflicting_mask_flags() {
        let flags = InterruptFlags::UNMASK_PREWAIT_UNLOCKED | InterruptFlags::MASK_POSTWAIT;
        let irq = InterruptDispatcher::new_physical(Arc::new(NullLine), flags).unwrap();
        assert_eq!(
            irq.bind(PortDispatcher::new(), 1),
            Err(DispatchError::InvalidArgs)
        );
    }

    #[test]
    fn test_unbind_wrong_port_not_found() {
        let irq = InterruptDispatcher::new_virtual();
        let bound = PortDispatcher::new();
        let other = PortDispatcher::new();

        assert_eq!(irq.unbind(&other), Err(DispatchError::NotFound));
        irq.bind(bound.clone(), 1).unwrap();
        assert_eq!(irq.unbind(&other), Err(DispatchError::NotFound));
        assert_eq!(irq.unbind(&bound), Ok(()));
    }

    #[test]
    fn test_unbind_resets_to_idle_and_drops_packet() {
        let irq = InterruptDispatcher::new_virtual();
        let port = PortDispatcher::new();
        irq.bind(port.clone(), 1).unwrap();

        irq.trigger(7).unwrap();
        assert_eq!(irq.state(), InterruptState::NeedAck);
        assert_eq!(port.queued_count(), 1);

        irq.unbind(&port).unwrap();
        assert_eq!(irq.state(), InterruptState::Idle);
        assert_eq!(port.dequeue(), None);

        // Clean slate: a rebind starts from scratch
        irq.bind(port.clone(), 2).unwrap();
        assert_eq!(irq.state(), InterruptState::Idle);
    }

    #[test]
    fn test_bind_flushes_earlier_trigger() {
        let irq = InterruptDispatcher::new_virtual();
        irq.trigger(55).unwrap();

        let port = PortDispatcher::new();
        irq.bind(port.clone(), 9).unwrap();
        assert_eq!(irq.state(), InterruptState::NeedAck);

        let packet = port.dequeue().unwrap();
        assert_eq!(packet.key, 9);
    }

    #[test]
    fn test_ack_without_port_bad_state() {
        let irq = InterruptDispatcher::new_virtual();
        assert_eq!(irq.ack(), Err(DispatchError::BadState));
    }

    #[test]
    fn test_ack_requeues_pending_timestamp() {
        let irq = InterruptDispatcher::new_virtual();
        let port = PortDispatcher::new();
        irq.bind(port.clone(), 1).unwrap();

        irq.trigger(10).unwrap();
        assert!(port.dequeue().is_some());

        // Fires again before the ack: coalesced into the pending timestamp
        irq.trigger(20).unwrap();
        assert_eq!(port.queued_count(), 0);

        irq.ack().unwrap();
        assert_eq!(irq.state(), InterruptState::NeedAck);
        let packet = port.dequeue().unwrap();
        assert_eq!(
            packet.contents,
            crate::port::PacketContents::Interrupt { timestamp: 20 }
        );
    }

    #[test]
    fn test_ack_with_nothing_pending_goes_idle() {
        let irq = InterruptDispatcher::new_virtual();
        let port = PortDispatcher::new();
        irq.bind(port.clone(), 1).unwrap();

        irq.trigger(10).unwrap();
        assert!(port.dequeue().is_some());
        irq.ack().unwrap();
        assert_eq!(irq.state(), InterruptState::Idle);
    }

    #[test]
    fn test_ack_while_packet_still_queued_bad_state() {
        let irq = InterruptDispatcher::new_virtual();
        let port = PortDispatcher::new();
        irq.bind(port.clone(), 1).unwrap();

        irq.trigger(10).unwrap();
        // Not dequeued yet; a second firing leaves a pending timestamp
        irq.trigger(20).unwrap();
        assert_eq!(irq.ack(), Err(DispatchError::BadState));
    }

    #[test]
    fn test_interrupted_wait_resets_to_idle() {
        use std::thread;
        use std::time::Duration;

        let irq = InterruptDispatcher::new_virtual();
        let waiter = {
            let irq = irq.clone();
            thread::spawn(move || irq.wait_for_interrupt())
        };
        thread::sleep(Duration::from_millis(50));
        assert_eq!(irq.state(), InterruptState::Waiting);

        // Thread-layer wakeup with no trigger behind it
        irq.event.interrupt();
        assert_eq!(
            waiter.join().unwrap(),
            Err(DispatchError::InterruptedRetry)
        );
        assert_eq!(irq.state(), InterruptState::Idle);

        // The retry works: a later trigger completes a fresh wait
        irq.trigger(5).unwrap();
        assert_eq!(irq.wait_for_interrupt(), Ok(5));
    }

    #[test]
    fn test_destroy_is_terminal_and_idempotent() {
        let irq = InterruptDispatcher::new_virtual();
        assert_eq!(irq.destroy(), Ok(()));
        assert_eq!(irq.destroy(), Ok(()));
        assert_eq!(irq.state(), InterruptState::Destroyed);

        assert_eq!(irq.trigger(1), Err(DispatchError::Canceled));
        assert_eq!(irq.wait_for_interrupt(), Err(DispatchError::Canceled));
        assert_eq!(
            irq.bind(PortDispatcher::new(), 1),
            Err(DispatchError::Canceled)
        );
        assert_eq!(irq.attach_vcpu(), Err(DispatchError::Canceled));
        assert_eq!(irq.set_flags(InterruptFlags::VIRTUAL), Err(DispatchError::BadState));
    }

    #[test]
    fn test_destroy_with_unacked_consumer_reports_not_found() {
        let irq = InterruptDispatcher::new_virtual();
        let port = PortDispatcher::new();
        irq.bind(port.clone(), 1).unwrap();

        irq.trigger(10).unwrap();
        assert!(port.dequeue().is_some());

        assert_eq!(irq.destroy(), Err(DispatchError::NotFound));
        assert_eq!(irq.state(), InterruptState::Destroyed);
        assert_eq!(irq.ack(), Err(DispatchError::Canceled));
    }

    #[test]
    fn test_destroy_withdraws_queued_packet() {
        let irq = InterruptDispatcher::new_virtual();
        let port = PortDispatcher::new();
        irq.bind(port.clone(), 1).unwrap();

        irq.trigger(10).unwrap();
        assert_eq!(port.queued_count(), 1);

        assert_eq!(irq.destroy(), Ok(()));
        assert_eq!(port.dequeue(), None);
    }

    #[test]
    fn test_handler_ignored_after_destroy() {
        let irq =
            InterruptDispatcher::new_physical(Arc::new(NullLine), InterruptFlags::empty())
                .unwrap();
        irq.destroy().unwrap();
        irq.interrupt_handler();
        assert_eq!(irq.state(), InterruptState::Destroyed);
    }
}
