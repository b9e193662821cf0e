//! The coroutine scheduler and event loop (spec sections 4.5, 4.5.2-4.5.5,
//! 5): single-threaded, cooperative, one tick advances every `READY`
//! coroutine in a runtime instance by one suspension point.
//!
//! Evaluating an element's attributes and content -- the actual HVML tag
//! semantics -- is out of scope here (spec section 1); a host supplies that
//! logic through [`FrameEvaluator`], and this module is only responsible for
//! the coroutine/frame/observer/timer machinery around it.

pub mod cancel;
pub mod child;
pub mod movebuf;
pub mod timer;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::coroutine::{Coroutine, CoroutineToken, NextStep, RunState, Stage, StackFrame, SymbolicVar};
use crate::error::PurcResult;
use crate::observer::{HandleFn, MatchFn, Message, Observer, ReduceOp};
use crate::runtime::Runtime;
use crate::variant::Variant;
use crate::vdom::VdomNode;
use cancel::CancelList;
use child::ChildLink;
use timer::TimerWheel;

/// Supplies the per-tag logic this crate doesn't implement (spec section 1's
/// scope note): evaluating a frame's attributes and content, and picking
/// its next child.
pub trait FrameEvaluator {
    fn eval_attrs(&self, co: &Coroutine, frame_index: usize) -> PurcResult<Variant>;
    fn eval_content(&self, co: &Coroutine, frame_index: usize) -> PurcResult<Variant>;
    fn next_child(&self, co: &Coroutine, frame_index: usize) -> Option<Rc<VdomNode>>;
}

/// Lets egress collaborators (spec section 6.2's renderer, a network
/// fetcher) post pending responses onto their owning coroutine's queue
/// during the scheduler's fourth tick step.
pub trait EgressCollaborator {
    fn deliver_pending(&self, runtime: &Runtime);
}

/// What a completed tick expects the host's outer loop to do next (spec
/// section 4.5's fifth step). Sleeping itself -- on an OS timer, an async
/// reactor, whatever the host uses -- is left to the host.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// At least one coroutine is `READY`; call `tick` again immediately.
    Continue,
    /// Nothing is `READY`, but coroutines remain with pending timers or
    /// observers; wait until `sleep_until_ms` (if any) or until external
    /// input arrives, then call `tick` again.
    Idle { sleep_until_ms: Option<u64> },
    /// No coroutines remain and `keep_alive` is unset; stop calling `tick`.
    Exit,
}

/// Drives every coroutine belonging to one [`Runtime`] (spec section 9).
pub struct Scheduler {
    pub runtime: Rc<Runtime>,
    timers: RefCell<TimerWheel>,
    cancellables: RefCell<HashMap<CoroutineToken, CancelList>>,
    child_links: RefCell<Vec<ChildLink>>,
    collaborators: RefCell<Vec<Rc<dyn EgressCollaborator>>>,
    /// Whether the loop should keep running once no coroutine remains (spec
    /// section 4.5's fifth step); a long-lived host sets this, a one-shot
    /// CLI run doesn't.
    pub keep_alive: bool,
}

impl Scheduler {
    pub fn new(runtime: Rc<Runtime>) -> Scheduler {
        Scheduler {
            runtime,
            timers: RefCell::new(TimerWheel::new()),
            cancellables: RefCell::new(HashMap::new()),
            child_links: RefCell::new(Vec::new()),
            collaborators: RefCell::new(Vec::new()),
            keep_alive: false,
        }
    }

    pub fn add_collaborator(&self, collaborator: Rc<dyn EgressCollaborator>) {
        self.collaborators.borrow_mut().push(collaborator);
    }

    /// Registers `child` as spawned and curated by `curator` (spec section
    /// 4.5.4).
    pub fn link_child(&self, curator: CoroutineToken, child: CoroutineToken) {
        self.child_links.borrow_mut().push(ChildLink { child, curator });
    }

    pub fn curator_of(&self, child: CoroutineToken) -> Option<CoroutineToken> {
        self.child_links
            .borrow()
            .iter()
            .find(|link| link.child == child)
            .map(|link| link.curator)
    }

    pub fn schedule_timeout(&self, token: CoroutineToken, deadline_ms: u64) {
        self.timers.borrow_mut().schedule(token, deadline_ms);
        if let Some(co) = self.runtime.coroutines.get(token) {
            co.deadline.set(Some(deadline_ms));
            co.set_state(RunState::Stopped);
        }
    }

    pub fn cancellables_for(&self, token: CoroutineToken) -> std::cell::RefMut<'_, CancelList> {
        std::cell::RefMut::map(self.cancellables.borrow_mut(), |m| {
            m.entry(token).or_insert_with(CancelList::new)
        })
    }

    /// Forcibly terminates a coroutine: runs its cancellables in reverse
    /// order, then marks it `TERMINATED` (spec section 4.5.3).
    pub fn terminate(&self, token: CoroutineToken) {
        if let Some(mut list) = self.cancellables.borrow_mut().remove(&token) {
            list.cancel_all();
        }
        self.timers.borrow_mut().cancel(token);
        if let Some(co) = self.runtime.coroutines.get(token) {
            co.set_state(RunState::Terminated);
        }
    }

    /// `yield(observed, type, sub_type, match_fn, handle_fn)` (spec section
    /// 4.5.2): registers an internal observer on the coroutine's stack and
    /// flips it to `OBSERVING`.
    pub fn yield_on(
        &self,
        co: &Coroutine,
        observed: Variant,
        event_type: impl Into<String>,
        sub_type: impl Into<String>,
        is_match: MatchFn,
        handle: HandleFn,
    ) {
        co.observers.borrow_mut().intr_observers.push(Observer {
            observed,
            event_type: event_type.into(),
            sub_type: sub_type.into(),
            scope: None,
            pos: None,
            is_match,
            handle,
            auto_remove: true,
            cor_stage: None,
            cor_state: Some(RunState::Observing),
        });
        co.set_stage(Stage::Observing);
        co.set_state(RunState::Observing);
    }

    /// Posts `msg` directly onto `token`'s queue, bypassing the external
    /// queue (used by child-coroutine lifecycle events and same-instance
    /// senders).
    pub fn post(&self, token: CoroutineToken, msg: Message) {
        if let Some(co) = self.runtime.coroutines.get(token) {
            co.queue.borrow_mut().push(msg);
        }
    }

    /// Drains the instance's external queue, routing each message by its
    /// `target` (spec section 4.5 step 1).
    fn drain_external_queue(&self) {
        loop {
            let msg = self.runtime.external_queue.borrow_mut().pull_one();
            match msg {
                Some(msg) => {
                    if let Some(token) = msg.target {
                        self.post(token, msg);
                    }
                }
                None => break,
            }
        }
    }

    /// Dispatches at most one pending message per `READY`/`OBSERVING`
    /// coroutine to its observers (spec sections 4.6, 4.7).
    fn dispatch_one_message(&self, co: &Rc<Coroutine>) {
        let msg = co.queue.borrow_mut().pull_one();
        let Some(msg) = msg else { return };
        let stage = co.stage();
        let became_ready = co.observers.borrow_mut().dispatch(&msg, stage, co.state(), |_| {});
        if became_ready {
            co.set_state(RunState::Ready);
        }
    }

    /// Runs one frame-execution step for `co` (spec section 4.5.1):
    /// `AFTER_PUSHED -> SELECT_CHILD -> ON_POPPING -> RERUN`, looping back
    /// to `SELECT_CHILD` for the next sibling.
    fn run_one_step(&self, co: &Rc<Coroutine>, evaluator: &dyn FrameEvaluator) {
        if co.state() != RunState::Ready {
            return;
        }
        co.set_state(RunState::Running);

        if co.depth() == 0 {
            let root = co.vdom.root.borrow().clone();
            match root {
                Some(root) => {
                    co.push_frame(StackFrame::normal(root));
                    co.set_stage(Stage::FirstRun);
                }
                None => {
                    co.set_state(RunState::Exited);
                    return;
                }
            }
        }

        let idx = co.depth() - 1;
        let next_step = co.frames.borrow()[idx].next_step.get();

        match next_step {
            NextStep::AfterPushed => match evaluator.eval_attrs(co, idx) {
                Ok(v) => {
                    co.frames.borrow()[idx].set_var(SymbolicVar::LastAttrResult, v);
                    if co.state() == RunState::Observing {
                        return;
                    }
                    co.frames.borrow()[idx].next_step.set(NextStep::SelectChild);
                }
                Err(_) => co.frames.borrow()[idx].next_step.set(NextStep::OnPopping),
            },
            NextStep::SelectChild => match evaluator.next_child(co, idx) {
                Some(child) => co.push_frame(StackFrame::normal(child)),
                None => co.frames.borrow()[idx].next_step.set(NextStep::OnPopping),
            },
            NextStep::OnPopping => {
                let content = evaluator.eval_content(co, idx).ok();
                if co.state() == RunState::Observing {
                    return;
                }
                if let Some(v) = content {
                    *co.frames.borrow()[idx].evaluated_content.borrow_mut() = Some(v);
                }
                let finished = co.pop_frame().expect("idx came from nonzero depth");
                let result = finished
                    .get_var(SymbolicVar::ResultFromChild)
                    .or_else(|| finished.evaluated_content.borrow().clone());
                match co.depth().checked_sub(1) {
                    Some(parent_idx) => {
                        if let Some(result) = result {
                            co.frames.borrow()[parent_idx].set_var(SymbolicVar::ResultFromChild, result);
                        }
                        co.frames.borrow()[parent_idx].next_step.set(NextStep::Rerun);
                    }
                    None => {
                        co.set_stage(Stage::Cleanup);
                        co.set_state(RunState::Exited);
                        return;
                    }
                }
            }
            NextStep::Rerun => co.frames.borrow()[idx].next_step.set(NextStep::SelectChild),
        }

        if co.state() == RunState::Running {
            co.set_state(RunState::Ready);
        }
    }

    /// Runs one scheduler tick (spec section 4.5's five steps).
    pub fn tick(&self, now_ms: u64, evaluator: &dyn FrameEvaluator) -> TickOutcome {
        self.drain_external_queue();

        let tokens = self.runtime.coroutines.tokens();
        for token in &tokens {
            let Some(co) = self.runtime.coroutines.get(*token) else {
                continue;
            };
            if !co.queue.borrow().is_empty() && co.state() != RunState::Running {
                self.dispatch_one_message(&co);
            }
            // Run the outermost frame to its next cooperative suspension
            // point (spec section 4.5 step 2), not just one `NextStep`
            // transition: keep stepping while the coroutine stays `Ready`,
            // stopping the moment it yields (`Observing`) or finishes
            // (`Exited`).
            while co.state() == RunState::Ready {
                self.run_one_step(&co, evaluator);
            }
        }

        for token in self.timers.borrow_mut().expired(now_ms) {
            if let Some(co) = self.runtime.coroutines.get(token) {
                co.deadline.set(None);
                co.queue.borrow_mut().push(Message {
                    event_type: "expired".to_string(),
                    sub_type: String::new(),
                    source_uri: String::new(),
                    element_value: String::new(),
                    event_name: "expired".to_string(),
                    data: vec![],
                    request_id: String::new(),
                    reduce_op: ReduceOp::None,
                    target: Some(token),
                });
                co.set_state(RunState::Ready);
            }
        }

        for collaborator in self.collaborators.borrow().iter() {
            collaborator.deliver_pending(&self.runtime);
        }

        let tokens = self.runtime.coroutines.tokens();
        if tokens.is_empty() {
            return if self.keep_alive {
                TickOutcome::Idle { sleep_until_ms: None }
            } else {
                TickOutcome::Exit
            };
        }
        let any_ready = tokens.iter().any(|t| {
            self.runtime
                .coroutines
                .get(*t)
                .map(|co| co.state() == RunState::Ready)
                .unwrap_or(false)
        });
        if any_ready {
            TickOutcome::Continue
        } else {
            TickOutcome::Idle {
                sleep_until_ms: self.timers.borrow().earliest_deadline(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomBucket;
    use crate::coroutine::RunState;
    use crate::variant::VariantData;
    use crate::vdom::{Document, Element};
    use std::cell::Cell;

    struct NoopEvaluator {
        calls: Cell<usize>,
    }

    impl FrameEvaluator for NoopEvaluator {
        fn eval_attrs(&self, _co: &Coroutine, _frame_index: usize) -> PurcResult<Variant> {
            self.calls.set(self.calls.get() + 1);
            Ok(Variant::from(VariantData::Undefined))
        }

        fn eval_content(&self, _co: &Coroutine, _frame_index: usize) -> PurcResult<Variant> {
            Ok(Variant::from(VariantData::Undefined))
        }

        fn next_child(&self, _co: &Coroutine, _frame_index: usize) -> Option<Rc<VdomNode>> {
            None
        }
    }

    fn make_root_document() -> Rc<Document> {
        let doc = Document::new();
        let tag = crate::atom::AtomTable::global().from_string(AtomBucket::Def, "hvml");
        let root = Rc::new(VdomNode::Element(Element {
            id: doc.alloc_id(),
            tag,
            attrs: RefCell::new(vec![]),
            children: RefCell::new(vec![]),
            self_closing: Cell::new(false),
        }));
        *doc.root.borrow_mut() = Some(root);
        doc
    }

    #[test]
    fn a_leaf_coroutine_runs_to_exit_in_one_tick() {
        // A leaf element never yields, so its whole run -- AFTER_PUSHED ->
        // SELECT_CHILD -> ON_POPPING -> exit -- is one "next cooperative
        // suspension point" (spec section 4.5 step 2) and completes within
        // a single tick.
        let rt = Runtime::new();
        let co = rt.spawn(make_root_document(), None);
        let scheduler = Scheduler::new(rt.clone());
        let evaluator = NoopEvaluator { calls: Cell::new(0) };

        scheduler.tick(0, &evaluator);
        assert_eq!(co.state(), RunState::Exited);
        assert_eq!(evaluator.calls.get(), 1);
    }

    #[test]
    fn tick_exits_once_no_coroutines_remain_and_not_kept_alive() {
        let rt = Runtime::new();
        let scheduler = Scheduler::new(rt);
        let evaluator = NoopEvaluator { calls: Cell::new(0) };
        assert_eq!(scheduler.tick(0, &evaluator), TickOutcome::Exit);
    }

    #[test]
    fn expired_timer_makes_a_stopped_coroutine_ready_again() {
        let rt = Runtime::new();
        let co = rt.spawn(make_root_document(), None);
        let scheduler = Scheduler::new(rt);
        co.set_state(RunState::Stopped);
        scheduler.schedule_timeout(co.token, 100);

        let evaluator = NoopEvaluator { calls: Cell::new(0) };
        scheduler.tick(50, &evaluator);
        assert_eq!(co.state(), RunState::Stopped);
        scheduler.tick(100, &evaluator);
        assert_eq!(co.state(), RunState::Ready);
        assert_eq!(co.queue.borrow().len(), 1);
    }

    #[test]
    fn terminate_runs_cancellables_in_reverse_order() {
        let rt = Runtime::new();
        let co = rt.spawn(make_root_document(), None);
        let scheduler = Scheduler::new(rt);
        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let mut list = scheduler.cancellables_for(co.token);
            let o1 = order.clone();
            list.register_cancel(move || o1.borrow_mut().push(1));
            let o2 = order.clone();
            list.register_cancel(move || o2.borrow_mut().push(2));
        }
        scheduler.terminate(co.token);
        assert_eq!(*order.borrow(), vec![2, 1]);
        assert_eq!(co.state(), RunState::Terminated);
    }
}
