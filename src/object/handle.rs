/*!
 * Handles
 * Owning references that drive cancellation and teardown
 */

use super::deleter;
use super::dispatcher::KernelObject;
use crate::core::{alloc_handle_id, HandleId};
use log::debug;
use std::sync::Arc;

/// An owning reference to a kernel object
///
/// Every handle has process-unique identity; waits registered through a
/// handle are scoped to it. Closing (dropping) the handle cancels those
/// waits, and closing the last handle to an object runs the object's
/// zero-handles hook and routes the final reference through the safe
/// deleter so teardown chains cannot overflow the stack.
pub struct Handle<T: KernelObject + 'static> {
    id: HandleId,
    object: Option<Arc<T>>,
}

impl<T: KernelObject + 'static> Handle<T> {
    /// Wrap an object reference in a new handle
    pub fn new(object: Arc<T>) -> Self {
        object.dispatcher().increment_handle_count();
        Self {
            id: alloc_handle_id(),
            object: Some(object),
        }
    }

    /// Handle identity; scopes waits registered through this handle
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The referenced object
    pub fn object(&self) -> &Arc<T> {
        self.object.as_ref().expect("handle object present until close")
    }

    /// Open a second, independently closable handle to the same object
    pub fn duplicate(&self) -> Self {
        Self::new(self.object().clone())
    }
}

impl<T: KernelObject + 'static> Drop for Handle<T> {
    fn drop(&mut self) {
        let Some(object) = self.object.take() else {
            return;
        };

        let dispatcher = object.dispatcher();
        if dispatcher.object_type().is_waitable() {
            dispatcher.cancel(self.id);
        }

        if dispatcher.decrement_handle_count() {
            debug!(
                "Last handle to koid {} closed, tearing down",
                dispatcher.koid()
            );
            object.on_zero_handles();
            deleter::release(object);
        }
    }
}
