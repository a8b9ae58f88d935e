/*!
 * Object Layer
 * Dispatchers, observers, handles, and recursion-free teardown
 */

pub mod deleter;
pub mod dispatcher;
pub mod event;
pub mod handle;
pub mod observer;
pub mod signals;

// Re-export for convenience
pub use dispatcher::{Dispatcher, KernelObject};
pub use event::EventDispatcher;
pub use handle::Handle;
pub use observer::{Disposition, SignalObserver, StateObserver};
pub use signals::Signals;
