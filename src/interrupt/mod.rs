/*!
 * Interrupt Layer
 * Interrupt objects, their flags, and the platform line seam
 */

pub mod dispatcher;
pub mod flags;
pub mod line;

// Re-export for convenience
pub use dispatcher::{InterruptDispatcher, InterruptState};
pub use flags::InterruptFlags;
pub use line::{InterruptLine, NullLine};
