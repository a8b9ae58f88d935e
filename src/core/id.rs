/*!
 * ID Generation
 * Type-safe object and handle identifiers with process-wide assignment
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// Type-Safe ID Wrappers
// ============================================================================

/// Kernel object ID (64-bit, never recycled)
///
/// Assigned once at object creation; a koid seen anywhere in the system
/// always refers to the same object, even after that object is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Koid(pub u64);

/// Handle ID (64-bit, never recycled)
///
/// Identifies one owning reference to an object. Observers registered
/// through a handle are scoped to it for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandleId(pub u64);

impl fmt::Display for Koid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Atomic Counter Generator
// ============================================================================

/// Monotonic counter for ID assignment
///
/// # Performance
/// - Cache-line aligned to prevent false sharing
/// - Lock-free atomic operations
///
/// IDs are never recycled: uniqueness over the whole process lifetime is
/// what lets stale IDs fail safely instead of aliasing a new object.
#[repr(C, align(64))]
pub struct AtomicGenerator {
    counter: AtomicU64,
}

impl AtomicGenerator {
    /// Create new generator starting at given value
    #[inline]
    pub const fn new(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    /// Generate next ID
    #[inline]
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Get current counter value (for debugging)
    #[inline]
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }
}

/// Assign the next koid
///
/// Values below 1024 are reserved for well-known objects.
pub fn alloc_koid() -> Koid {
    static KOIDS: AtomicGenerator = AtomicGenerator::new(1024);
    Koid(KOIDS.next())
}

/// Assign the next handle ID
pub fn alloc_handle_id() -> HandleId {
    static HANDLE_IDS: AtomicGenerator = AtomicGenerator::new(1);
    HandleId(HANDLE_IDS.next())
}

// ============================================================================
// Tests
// ============================================================================
