/*!
 * Core Types
 * Common types used across the dispatch subsystem
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::Instant;

/// Timestamp in nanoseconds since boot
///
/// Zero is reserved to mean "no timestamp recorded".
pub type Timestamp = u64;

/// Port packet key chosen by the waiter to correlate completions
pub type PacketKey = u64;

/// Kernel object kinds known to the dispatch layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Event,
    Channel,
    Process,
    Port,
    Interrupt,
    Vcpu,
}

impl ObjectType {
    /// Whether observers may be attached to objects of this kind
    ///
    /// Ports are consumed rather than waited on, and interrupts have their
    /// own blocking verb, so neither accepts observers.
    pub fn is_waitable(&self) -> bool {
        matches!(
            self,
            ObjectType::Event | ObjectType::Channel | ObjectType::Process
        )
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectType::Event => "event",
            ObjectType::Channel => "channel",
            ObjectType::Process => "process",
            ObjectType::Port => "port",
            ObjectType::Interrupt => "interrupt",
            ObjectType::Vcpu => "vcpu",
        };
        write!(f, "{}", name)
    }
}

/// Current monotonic time in nanoseconds since the first call
///
/// Never returns zero, so a recorded value can always be told apart from
/// the "no timestamp" sentinel.
pub fn current_ticks() -> Timestamp {
    static BOOT: OnceLock<Instant> = OnceLock::new();
    let boot = BOOT.get_or_init(Instant::now);
    (boot.elapsed().as_nanos() as u64).max(1)
}
