/*!
 * Safe Deleter
 * Flattens recursive object teardown into a per-thread worklist
 */

use super::dispatcher::KernelObject;
use log::trace;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

thread_local! {
    /// Teardown worklist; `Some` while a release loop is running on this thread
    static WORKLIST: RefCell<Option<VecDeque<Arc<dyn KernelObject>>>> = RefCell::new(None);
}

/// Release an owning object reference without unbounded recursion
///
/// Dropping an object can release the last reference to an object it owns,
/// which naively recurses one stack frame per link in the ownership chain.
/// The first `release` on a thread becomes the deleter: it installs a
/// worklist and drains it until quiescent. Nested calls, reached from inside
/// a destructor, only push onto the live worklist and return, so stack depth
/// stays constant no matter how long the chain is.
pub fn release(obj: Arc<dyn KernelObject>) {
    let became_deleter = WORKLIST.with(|cell| {
        let mut slot = cell.borrow_mut();
        match slot.as_mut() {
            Some(list) => {
                trace!("Deferring teardown of koid {}", obj.dispatcher().koid());
                list.push_back(obj);
                false
            }
            None => {
                let mut list = VecDeque::new();
                list.push_back(obj);
                *slot = Some(list);
                true
            }
        }
    });

    if !became_deleter {
        return;
    }

    // Drain until quiescent. Each drop runs outside the RefCell borrow so a
    // destructor calling back into release() sees the live worklist.
    loop {
        let next = WORKLIST.with(|cell| {
            cell.borrow_mut()
                .as_mut()
                .and_then(|list| list.pop_front())
        });
        match next {
            Some(obj) => drop(obj),
            None => break,
        }
    }
    WORKLIST.with(|cell| *cell.borrow_mut() = None);
}
