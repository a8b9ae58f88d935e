/*!
 * Safe Deleter Integration Tests
 *
 * Deep ownership chains and wide fan-out must tear down with constant
 * native stack depth, so the suites below run on deliberately small stacks
 */

use kdispatch::{deleter, Dispatcher, KernelObject, ObjectType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Object owning an arbitrary set of other objects, released on drop
struct OwningNode {
    dispatcher: Dispatcher,
    owned: Vec<Arc<dyn KernelObject>>,
    alive: Arc<AtomicUsize>,
}

impl OwningNode {
    fn new(owned: Vec<Arc<dyn KernelObject>>, alive: Arc<AtomicUsize>) -> Arc<Self> {
        alive.fetch_add(1, Ordering::SeqCst);
        Arc::new(Self {
            dispatcher: Dispatcher::new(ObjectType::Event),
            owned,
            alive,
        })
    }
}

impl KernelObject for OwningNode {
    fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }
}

impl Drop for OwningNode {
    fn drop(&mut self) {
        for obj in self.owned.drain(..) {
            deleter::release(obj);
        }
        self.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

fn chain(len: usize, alive: &Arc<AtomicUsize>) -> Arc<dyn KernelObject> {
    let mut head: Arc<dyn KernelObject> = OwningNode::new(Vec::new(), alive.clone());
    for _ in 0..len {
        head = OwningNode::new(vec![head], alive.clone());
    }
    head
}

/// Run `f` on a thread whose stack is far too small for recursive teardown
fn on_small_stack(f: impl FnOnce() + Send + 'static) {
    thread::Builder::new()
        .stack_size(128 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap();
}

#[test]
fn test_deep_chain_releases_on_small_stack() {
    on_small_stack(|| {
        let alive = Arc::new(AtomicUsize::new(0));
        let head = chain(100_000, &alive);
        assert_eq!(alive.load(Ordering::SeqCst), 100_001);

        deleter::release(head);
        assert_eq!(alive.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn test_wide_fanout_releases_on_small_stack() {
    on_small_stack(|| {
        let alive = Arc::new(AtomicUsize::new(0));
        // A comb: every tooth is itself a chain
        let teeth: Vec<Arc<dyn KernelObject>> =
            (0..100).map(|_| chain(1_000, &alive)).collect();
        let root = OwningNode::new(teeth, alive.clone());
        assert_eq!(alive.load(Ordering::SeqCst), 100 * 1_001 + 1);

        deleter::release(root);
        assert_eq!(alive.load(Ordering::SeqCst), 0);
    });
}

#[test]
fn test_threads_release_independently() {
    let alive = Arc::new(AtomicUsize::new(0));
    let threads: Vec<_> = (0..8)
        .map(|_| {
            let alive = alive.clone();
            thread::spawn(move || {
                for _ in 0..20 {
                    let head = chain(500, &alive);
                    deleter::release(head);
                }
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(alive.load(Ordering::SeqCst), 0);
}

#[test]
fn test_release_sequence_reuses_worklist_cleanly() {
    // Back-to-back top-level releases on one thread: each becomes the
    // deleter, drains, and resets, leaving nothing for the next round.
    let alive = Arc::new(AtomicUsize::new(0));
    for len in [0, 1, 10, 1_000] {
        let head = chain(len, &alive);
        deleter::release(head);
        assert_eq!(alive.load(Ordering::SeqCst), 0);
    }
}
