//! Mutation listeners and the reverse-update chain shared by every
//! container variant (spec sections 3.2, 3.3, and the reentrancy note in
//! section 9).

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// A single mutation the interpreter can notify listeners about.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Inflated,
    Deflated,
    Modified,
    RefAsChild,
    Releasing,
}

/// Which phase a listener fires in, relative to the mutation it watches.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Phase {
    Pre,
    Post,
}

pub type OpHandler = Rc<dyn Fn(Op, &[crate::variant::Variant]) + 'static>;

/// One subscription on a container, as described in spec section 3.2: an
/// operation mask, a handler, and an opaque context value the handler
/// closure is expected to capture itself (Rust closures make the explicit
/// `ctxt` pointer from the C API unnecessary).
#[derive(Clone)]
pub struct Listener {
    pub ops: Vec<Op>,
    pub phase: Phase,
    pub handler: OpHandler,
}

impl Listener {
    fn matches(&self, op: Op) -> bool {
        self.ops.contains(&op)
    }
}

/// Shared bookkeeping embedded in every container (`Array`, `Object`,
/// `Set`, `Tuple`, `SortedArray`).
#[derive(Default)]
pub struct ContainerHeader {
    pre_listeners: RefCell<Vec<Listener>>,
    post_listeners: RefCell<Vec<Listener>>,
    /// Bumped once per logical mutation. A listener that mutates the very
    /// container it is watching must not be dispatched twice for the event
    /// that triggered it; we skip listeners whose registration generation
    /// equals the generation currently being dispatched (section 9).
    generation: Cell<u64>,
    dispatching_generation: Cell<Option<u64>>,
    /// The reverse-update edge: which parent container (if any) holds this
    /// container as a child slot. A `Weak` reference so a cycle can't keep
    /// either side alive, and so insertion can check ancestry without
    /// owning it (section 3.3).
    parent: RefCell<Option<Weak<dyn ParentLink>>>,
}

/// Implemented by every container so the reverse-update chain can walk
/// upward regardless of the concrete container kind.
pub trait ParentLink {
    /// Called when a descendant was mutated, so this container can in turn
    /// notify its own listeners and continue the walk toward the root.
    fn notify_child_modified(self: Rc<Self>);

    /// Identity used for cycle detection: two `Rc`s to the same container
    /// produce the same pointer.
    fn identity(&self) -> *const ();

    /// This container's own reverse-update parent, if any, used to walk the
    /// whole ancestor chain when checking for cycles.
    fn parent_link(&self) -> Option<Rc<dyn ParentLink>>;
}

impl ContainerHeader {
    pub fn add_listener(&self, phase: Phase, ops: Vec<Op>, handler: OpHandler) {
        let listener = Listener {
            ops,
            phase,
            handler,
        };
        match phase {
            Phase::Pre => self.pre_listeners.borrow_mut().push(listener),
            Phase::Post => self.post_listeners.borrow_mut().push(listener),
        }
    }

    pub fn remove_all(&self, phase: Phase) {
        match phase {
            Phase::Pre => self.pre_listeners.borrow_mut().clear(),
            Phase::Post => self.post_listeners.borrow_mut().clear(),
        }
    }

    fn fire(&self, phase: Phase, op: Op, argv: &[crate::variant::Variant]) {
        let listeners = match phase {
            Phase::Pre => &self.pre_listeners,
            Phase::Post => &self.post_listeners,
        };
        // Snapshot so a listener appending/removing listeners mid-dispatch
        // doesn't perturb this pass; matches "fire in registration order".
        let snapshot: Vec<Listener> = listeners
            .borrow()
            .iter()
            .filter(|l| l.matches(op))
            .cloned()
            .collect();
        for listener in snapshot {
            (listener.handler)(op, argv);
        }
    }

    /// Runs `mutate` between the pre- and post-listener passes for `op`,
    /// bumping the generation counter so reentrant mutations triggered by a
    /// listener are tracked under a fresh generation.
    pub fn dispatch_mutation<R>(
        &self,
        op: Op,
        argv_pre: &[crate::variant::Variant],
        mutate: impl FnOnce() -> R,
        argv_post: &[crate::variant::Variant],
    ) -> R {
        if self.is_dispatching() {
            // Reentrant call for the same container while already firing
            // listeners for an enclosing mutation: still perform the
            // mutation itself, but suppress the nested listener passes so
            // we never dispatch the same logical event twice (section 9).
            log::debug!("suppressing nested listener dispatch for {:?} (reentrant mutation)", op);
            return mutate();
        }

        let gen = self.generation.get() + 1;
        self.generation.set(gen);
        self.dispatching_generation.set(Some(gen));

        self.fire(Phase::Pre, op, argv_pre);
        let result = mutate();
        self.fire(Phase::Post, op, argv_post);

        self.dispatching_generation.set(None);
        // Kick off the reverse-update walk (section 3.3): this container
        // just mutated, so its own reverse-update parent (if any) needs to
        // hear about it and continue the walk toward the root.
        self.notify_modified();
        result
    }

    pub fn fire_releasing(&self) {
        self.fire(Phase::Post, Op::Releasing, &[]);
    }

    fn is_dispatching(&self) -> bool {
        self.dispatching_generation.get().is_some()
    }

    /// Sets (or clears) this container's reverse-update parent. Fails with
    /// `InvalidValue` if `new_parent` is an ancestor of `self` already,
    /// which would close a cycle (section 3.3 / section 9).
    pub fn set_parent(
        &self,
        self_identity: *const (),
        new_parent: Option<Rc<dyn ParentLink>>,
    ) -> crate::error::PurcResult<()> {
        let mut cursor = new_parent.clone();
        while let Some(p) = cursor {
            if p.identity() == self_identity {
                return crate::error::fail(crate::error::PurcError::InvalidValue);
            }
            cursor = p.parent_link();
        }
        *self.parent.borrow_mut() = new_parent.map(|p| Rc::downgrade(&p));
        Ok(())
    }

    pub fn notify_modified(&self) {
        if let Some(weak) = self.parent.borrow().as_ref() {
            if let Some(parent) = weak.upgrade() {
                parent.notify_child_modified();
            }
        }
    }

    /// Fires this container's own post-`Modified` listeners on behalf of a
    /// child that just changed, before the walk continues upward.
    pub fn fire_child_modified(&self) {
        self.fire(Phase::Post, Op::Modified, &[]);
    }

    pub fn parent_rc(&self) -> Option<Rc<dyn ParentLink>> {
        self.parent.borrow().as_ref().and_then(Weak::upgrade)
    }
}

/// Wires `child` up to report mutations to `parent` when `child` is a
/// container kind, enforcing the acyclicity invariant at insertion time
/// (spec section 3.3). A no-op for scalar/string/bsequence children.
pub fn link_child(
    parent: Rc<dyn ParentLink>,
    parent_identity: *const (),
    child: &crate::variant::Variant,
) -> crate::error::PurcResult<()> {
    use crate::variant::VariantData::*;
    let header: Option<&ContainerHeader> = match child.data() {
        Array(a) => Some(a.header()),
        Object(o) => Some(o.header()),
        Set(s) => Some(s.header()),
        Tuple(t) => Some(t.header()),
        SortedArray(s) => Some(s.header()),
        _ => None,
    };
    if let Some(h) = header {
        h.set_parent(parent_identity, Some(parent))?;
    }
    Ok(())
}
