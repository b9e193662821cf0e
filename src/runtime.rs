//! The runtime instance (spec section 2): the unit of isolation between
//! independent HVML programs that happen to share a process. Owns the
//! variant heap, the atom table, and every coroutine running under it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use slab::Slab;

use crate::atom::{Atom, AtomBucket, AtomTable};
use crate::coroutine::{Coroutine, CoroutineToken};
use crate::observer::MessageQueue;
use crate::variant::VariantHeap;
use crate::vdom::Document;

thread_local! {
    static RUNTIMES: RefCell<Vec<Rc<Runtime>>> = RefCell::new(vec![]);
}

/// Pushes a runtime onto the thread-local "current runtime" stack.
pub(crate) fn push_runtime(runtime: Rc<Runtime>) {
    RUNTIMES.with(|stack| stack.borrow_mut().push(runtime));
}

/// Pops the top of the thread-local "current runtime" stack.
pub(crate) fn pop_runtime() {
    RUNTIMES.with(|stack| {
        stack.borrow_mut().pop();
    });
}

/// Runs a function with the current runtime, if one is active.
pub fn with_current_runtime<F, R>(f: F) -> Option<R>
where
    F: FnOnce(&Runtime) -> R,
{
    RUNTIMES.with(|stack| stack.borrow().last().map(|r| f(r)))
}

/// The slab of coroutines belonging to one runtime instance (spec section
/// 9), plus the bookkeeping the scheduler's child-coroutine and
/// cross-instance messaging steps need (spec sections 4.5.4, 4.5.5).
pub struct CoroutineHeap {
    slots: RefCell<Slab<Rc<Coroutine>>>,
    /// The atom this instance's `MoveBuffer` is published under so other
    /// instances can address it (spec section 4.5.5).
    move_buffer_atom: Atom,
    /// Documents kept alive independently of their coroutine's slot, so a
    /// curator can still inspect a terminated child's vdom.
    documents: RefCell<HashMap<CoroutineToken, Rc<Document>>>,
}

impl CoroutineHeap {
    pub fn new(atoms: &AtomTable) -> Self {
        CoroutineHeap {
            slots: RefCell::new(Slab::new()),
            move_buffer_atom: atoms.from_string(AtomBucket::Custom(0), "$MOVE_BUFFER"),
            documents: RefCell::new(HashMap::new()),
        }
    }

    pub fn insert(&self, vdom: Rc<Document>, curator: Option<CoroutineToken>) -> Rc<Coroutine> {
        let mut slots = self.slots.borrow_mut();
        let entry = slots.vacant_entry();
        let token = CoroutineToken(entry.key());
        let co = Rc::new(Coroutine::new(token, vdom.clone(), curator));
        entry.insert(co.clone());
        drop(slots);
        self.documents.borrow_mut().insert(token, vdom);
        co
    }

    pub fn get(&self, token: CoroutineToken) -> Option<Rc<Coroutine>> {
        self.slots.borrow().get(token.0).cloned()
    }

    pub fn remove(&self, token: CoroutineToken) {
        let mut slots = self.slots.borrow_mut();
        if slots.contains(token.0) {
            slots.remove(token.0);
        }
        drop(slots);
        self.documents.borrow_mut().remove(&token);
    }

    pub fn tokens(&self) -> Vec<CoroutineToken> {
        self.slots.borrow().iter().map(|(k, _)| CoroutineToken(k)).collect()
    }

    pub fn move_buffer_atom(&self) -> Atom {
        self.move_buffer_atom
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

/// One running instance of this engine (spec section 2).
pub struct Runtime {
    pub heap: VariantHeap,
    pub atoms: AtomTable,
    pub coroutines: CoroutineHeap,
    /// Messages addressed to this instance as a whole, ahead of being
    /// routed to one of its coroutines (spec section 4.5.5).
    pub external_queue: RefCell<MessageQueue>,
}

impl Runtime {
    pub fn new() -> Rc<Runtime> {
        let atoms = AtomTable::new();
        let coroutines = CoroutineHeap::new(&atoms);
        Rc::new(Runtime {
            heap: VariantHeap::new(),
            atoms,
            coroutines,
            external_queue: RefCell::new(MessageQueue::new()),
        })
    }

    /// The runtime active on this thread, if [`RuntimeGuard`] has pushed one.
    pub fn current() -> Option<Rc<Runtime>> {
        RUNTIMES.with(|stack| stack.borrow().last().cloned())
    }

    pub fn spawn(self: &Rc<Self>, vdom: Rc<Document>, curator: Option<CoroutineToken>) -> Rc<Coroutine> {
        self.coroutines.insert(vdom, curator)
    }
}

/// Marks a runtime as "current" for the duration of the guard, mirroring a
/// host embedding several independent runtime instances in one process and
/// needing callbacks to find the right one without threading it through
/// every call.
pub struct RuntimeGuard(());

impl RuntimeGuard {
    pub fn new(runtime: Rc<Runtime>) -> Self {
        push_runtime(runtime);
        RuntimeGuard(())
    }

    pub fn with<O>(runtime: Rc<Runtime>, f: impl FnOnce() -> O) -> O {
        let guard = RuntimeGuard::new(runtime);
        let o = f();
        drop(guard);
        o
    }
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        pop_runtime();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawning_allocates_distinct_tokens() {
        let rt = Runtime::new();
        let a = rt.spawn(Document::new(), None);
        let b = rt.spawn(Document::new(), Some(a.token));
        assert_ne!(a.token, b.token);
        assert_eq!(rt.coroutines.len(), 2);
    }

    #[test]
    fn removing_a_coroutine_frees_its_slot() {
        let rt = Runtime::new();
        let a = rt.spawn(Document::new(), None);
        rt.coroutines.remove(a.token);
        assert!(rt.coroutines.get(a.token).is_none());
        assert!(rt.coroutines.is_empty());
    }

    #[test]
    fn guard_makes_runtime_current_only_while_held() {
        let rt = Runtime::new();
        assert!(Runtime::current().is_none());
        RuntimeGuard::with(rt.clone(), || {
            assert!(Runtime::current().is_some());
        });
        assert!(Runtime::current().is_none());
    }
}
