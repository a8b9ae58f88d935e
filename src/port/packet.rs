/*!
 * Port Packets
 * Completion records delivered through ports
 */

use crate::core::{PacketKey, Timestamp};
use crate::object::Signals;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Payload of a delivered packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketContents {
    /// A signal wait completed
    ///
    /// `trigger` is the mask the wait was armed with, `observed` the full
    /// signal state at match time.
    Signal { trigger: Signals, observed: Signals },
    /// An interrupt fired at `timestamp`
    Interrupt { timestamp: Timestamp },
}

/// A completion handed to the port consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPacket {
    /// Correlation key chosen by whoever armed the wait
    pub key: PacketKey,
    pub contents: PacketContents,
}

/// Reusable delivery slot owned by an interrupt object
///
/// An interrupt has at most one packet outstanding; triggers that arrive
/// while it is queued are coalesced. The slot is shared between the
/// interrupt and the port it is bound to, and all of its fields are written
/// only under the port's queue lock (the key additionally at bind time,
/// before any queueing can happen).
pub struct InterruptPacket {
    key: AtomicU64,
    timestamp: AtomicU64,
    queued: AtomicBool,
}

impl InterruptPacket {
    pub fn new() -> Self {
        Self {
            key: AtomicU64::new(0),
            timestamp: AtomicU64::new(0),
            queued: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> PacketKey {
        self.key.load(Ordering::SeqCst)
    }

    pub fn set_key(&self, key: PacketKey) {
        self.key.store(key, Ordering::SeqCst);
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp.load(Ordering::SeqCst)
    }

    pub(crate) fn set_timestamp(&self, timestamp: Timestamp) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Whether the slot currently sits in a port queue
    pub fn is_queued(&self) -> bool {
        self.queued.load(Ordering::SeqCst)
    }

    pub(crate) fn set_queued(&self, queued: bool) {
        self.queued.store(queued, Ordering::SeqCst);
    }
}

impl Default for InterruptPacket {
    fn default() -> Self {
        Self::new()
    }
}
