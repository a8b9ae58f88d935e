/*!
 * Port Layer
 * Packet queues and the observer that feeds them
 */

pub mod observer;
pub mod packet;
pub mod port;

// Re-export for convenience
pub use observer::PortObserver;
pub use packet::{InterruptPacket, PacketContents, PortPacket};
pub use port::PortDispatcher;
