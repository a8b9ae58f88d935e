/*!
 * Core Module
 * Fundamental types, error handling, ID assignment, and sync primitives
 */

pub mod errors;
pub mod id;
pub mod sync;
pub mod types;

// Re-export for convenience
pub use errors::{DispatchError, DispatchResult};
pub use id::{alloc_handle_id, alloc_koid, AtomicGenerator, HandleId, Koid};
pub use sync::{IrqSpinlock, KernelEvent};
pub use types::{current_ticks, ObjectType, PacketKey, Timestamp};
