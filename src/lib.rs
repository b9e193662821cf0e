#![doc = include_str!("../README.md")]

pub mod atom;
pub mod builder;
pub mod coroutine;
pub mod env;
pub mod error;
pub mod observer;
pub mod renderer;
pub mod runtime;
pub mod scheduler;
pub mod scope;
pub mod url;
pub mod variant;
pub mod vdom;

pub(crate) mod innerlude {
    pub use crate::atom::{Atom, AtomBucket, AtomTable};
    pub use crate::builder::{InsertionMode, Token, VdomBuilder};
    pub use crate::coroutine::{Coroutine, CoroutineToken, EvalStep, NextStep, RunState, Stage, StackFrame, SymbolicVar};
    pub use crate::error::{fail, PurcError, PurcResult};
    pub use crate::observer::{Message, MessageQueue, Observer, ObserverSet, ReduceOp};
    pub use crate::runtime::{Runtime, RuntimeGuard};
    pub use crate::scheduler::{EgressCollaborator, FrameEvaluator, Scheduler, TickOutcome};
    pub use crate::scope::{ElementKey, ScopeLevel, ScopedVarTree, VariableManager};
    pub use crate::url::HvmlUri;
    pub use crate::variant::{Variant, VariantData, VariantHeap, VariantKind};
    pub use crate::vdom::{Comment, Content, Document, Element, NodeId, VdomNode};
}

pub use crate::innerlude::{
    Atom, AtomBucket, AtomTable, Coroutine, CoroutineToken, Document, ElementKey, HvmlUri,
    Message, MessageQueue, Observer, ObserverSet, PurcError, PurcResult, ReduceOp, Runtime,
    RuntimeGuard, Scheduler, ScopeLevel, ScopedVarTree, Stage, Variant, VariantData, VariantHeap,
    VariantKind, VdomNode,
};

/// Everything a host embedding this crate typically needs: the runtime
/// instance, the scheduler and its host-hook traits, the variant and vDOM
/// types, and the error type.
pub mod prelude {
    pub use crate::coroutine::{CoroutineToken, RunState, Stage};
    pub use crate::error::{PurcError, PurcResult};
    pub use crate::renderer::{PageType, RdrState, RendererCollaborator, RendererTransport};
    pub use crate::runtime::{Runtime, RuntimeGuard};
    pub use crate::scheduler::{child::ParserHook, EgressCollaborator, FrameEvaluator, Scheduler, TickOutcome};
    pub use crate::variant::{Variant, VariantData, VariantHeap};
    pub use crate::vdom::{Document, VdomNode};
}

/// Important third-party dependencies re-exported for hosts composing
/// against this crate's types directly.
pub mod exports {
    pub use once_cell;
    pub use slab;
}
