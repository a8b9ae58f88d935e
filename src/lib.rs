/*!
 * Kernel Dispatch Library
 * Object signal dispatch, observers, handles, ports, and interrupts
 */

pub mod core;
pub mod interrupt;
pub mod object;
pub mod port;

// Re-exports
pub use crate::core::{
    alloc_handle_id, alloc_koid, current_ticks, DispatchError, DispatchResult, HandleId,
    KernelEvent, Koid, ObjectType, PacketKey, Timestamp,
};
pub use interrupt::{InterruptDispatcher, InterruptFlags, InterruptLine, InterruptState, NullLine};
pub use object::{
    deleter, Dispatcher, Disposition, EventDispatcher, Handle, KernelObject, SignalObserver,
    Signals, StateObserver,
};
pub use port::{InterruptPacket, PacketContents, PortDispatcher, PortObserver, PortPacket};
