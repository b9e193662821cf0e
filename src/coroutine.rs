//! Coroutines and stack frames (spec sections 3.5 and 4.5.1): one
//! cooperatively scheduled HVML program, and the per-element frames that
//! make up its execution stack.

use crate::observer::{MessageQueue, ObserverSet};
use crate::scope::ScopedVarTree;
use crate::variant::Variant;
use crate::vdom::{Document, VdomNode};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// Short id unique within one runtime instance (spec section 3.5).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct CoroutineToken(pub usize);

/// Monotonically advancing lifecycle stage (spec section 3.5). Declaration
/// order is advancement order: [`Stage::advance`] panics on regression.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Stage {
    Scheduled,
    FirstRun,
    Observing,
    Cleanup,
}

impl Stage {
    pub fn advance(&mut self, next: Stage) {
        assert!(next >= *self, "coroutine stage must advance monotonically");
        *self = next;
    }
}

/// Runtime state (spec section 3.5), independent of [`Stage`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunState {
    Ready,
    Running,
    Stopped,
    Observing,
    Exited,
    Terminated,
    Tracked,
}

/// Which symbolic variable slot a frame binds (spec section 3.5).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SymbolicVar {
    /// `$?` - the result of the last evaluated child/content.
    ResultFromChild,
    /// `$<` - the result of the last attribute evaluation.
    LastAttrResult,
    /// `$@` - the current element.
    CurrentElement,
    /// `$!` - the current exception, if any.
    Exception,
    /// `$:` - the current element's unique identifier.
    ElementId,
    /// `$=` - the current match value (e.g. inside `<match>`).
    MatchValue,
    /// `$%` - the current iteration index.
    IterationIndex,
    /// `$^` - the current event/message that woke this frame.
    CurrentEvent,
}

/// Which step of evaluating one element a frame is at (spec section 3.5).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum EvalStep {
    EvalAttr,
    EvalContent,
    Done,
}

/// Drives what the scheduler does with a frame next (spec section 4.5.1):
/// `AfterPushed -> OnPopping -> Rerun -> SelectChild`, cycling back to
/// `SelectChild` for the next child or `OnPopping` once children run out.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NextStep {
    AfterPushed,
    OnPopping,
    Rerun,
    SelectChild,
}

/// Either a currently executing element or a placeholder frame used by
/// scheduler helpers (child-coroutine wrappers, synthetic wait points).
pub enum FrameKind {
    Normal { element: Rc<VdomNode> },
    Pseudo { label: &'static str },
}

pub struct StackFrame {
    pub kind: FrameKind,
    pub eval_step: Cell<EvalStep>,
    pub next_step: Cell<NextStep>,
    pub vars: RefCell<HashMap<SymbolicVar, Variant>>,
    /// This frame's own evaluated content (`$?` as seen by the element
    /// itself, before it's handed up to the parent's `result_from_child`).
    pub evaluated_content: RefCell<Option<Variant>>,
}

impl StackFrame {
    pub fn normal(element: Rc<VdomNode>) -> Self {
        StackFrame {
            kind: FrameKind::Normal { element },
            eval_step: Cell::new(EvalStep::EvalAttr),
            next_step: Cell::new(NextStep::AfterPushed),
            vars: RefCell::new(HashMap::new()),
            evaluated_content: RefCell::new(None),
        }
    }

    pub fn pseudo(label: &'static str) -> Self {
        StackFrame {
            kind: FrameKind::Pseudo { label },
            eval_step: Cell::new(EvalStep::EvalAttr),
            next_step: Cell::new(NextStep::AfterPushed),
            vars: RefCell::new(HashMap::new()),
            evaluated_content: RefCell::new(None),
        }
    }

    pub fn element(&self) -> Option<&Rc<VdomNode>> {
        match &self.kind {
            FrameKind::Normal { element } => Some(element),
            FrameKind::Pseudo { .. } => None,
        }
    }

    pub fn get_var(&self, var: SymbolicVar) -> Option<Variant> {
        self.vars.borrow().get(&var).map(Variant::make_ref)
    }

    pub fn set_var(&self, var: SymbolicVar, value: Variant) {
        self.vars.borrow_mut().insert(var, value);
    }
}

/// One cooperatively scheduled HVML program (spec section 3.5).
pub struct Coroutine {
    pub token: CoroutineToken,
    pub vdom: Rc<Document>,
    pub frames: RefCell<Vec<StackFrame>>,
    pub queue: RefCell<MessageQueue>,
    pub scopes: ScopedVarTree,
    pub observers: RefCell<ObserverSet>,
    stage: Cell<Stage>,
    state: Cell<RunState>,
    /// Set when an uncaught exception reaches this coroutine (spec section
    /// 7's `except` slot).
    pub except: RefCell<Option<Variant>>,
    /// The coroutine that spawned this one, if any (spec section 4.5.4).
    pub curator: Option<CoroutineToken>,
    /// Stop deadline, monotonic milliseconds since the runtime's epoch
    /// (spec section 4.5.3 and the `TimerWheel` in `crate::scheduler`).
    pub deadline: Cell<Option<u64>>,
}

impl Coroutine {
    pub fn new(token: CoroutineToken, vdom: Rc<Document>, curator: Option<CoroutineToken>) -> Self {
        Coroutine {
            token,
            vdom,
            frames: RefCell::new(Vec::new()),
            queue: RefCell::new(MessageQueue::new()),
            scopes: ScopedVarTree::new(),
            observers: RefCell::new(ObserverSet::new()),
            stage: Cell::new(Stage::Scheduled),
            state: Cell::new(RunState::Ready),
            except: RefCell::new(None),
            curator,
            deadline: Cell::new(None),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage.get()
    }

    pub fn set_stage(&self, stage: Stage) {
        let mut s = self.stage.get();
        s.advance(stage);
        self.stage.set(s);
    }

    pub fn state(&self) -> RunState {
        self.state.get()
    }

    pub fn set_state(&self, state: RunState) {
        self.state.set(state);
    }

    pub fn push_frame(&self, frame: StackFrame) {
        self.frames.borrow_mut().push(frame);
    }

    pub fn pop_frame(&self) -> Option<StackFrame> {
        self.frames.borrow_mut().pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.borrow().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic]
    fn stage_cannot_regress() {
        let mut stage = Stage::Observing;
        stage.advance(Stage::FirstRun);
    }

    #[test]
    fn stage_advances_monotonically() {
        let mut stage = Stage::Scheduled;
        stage.advance(Stage::FirstRun);
        stage.advance(Stage::Observing);
        stage.advance(Stage::Cleanup);
        assert_eq!(stage, Stage::Cleanup);
    }

    #[test]
    fn coroutine_starts_ready_and_scheduled() {
        let doc = Document::new();
        let co = Coroutine::new(CoroutineToken(1), doc, None);
        assert_eq!(co.stage(), Stage::Scheduled);
        assert_eq!(co.state(), RunState::Ready);
    }
}
