//! The observer / event delivery subsystem (spec sections 4.6 and 4.7): per
//! coroutine subscriptions against variants and vDOM elements, plus the
//! per-coroutine message queue they're driven by.

use crate::coroutine::{CoroutineToken, RunState, Stage};
use crate::variant::Variant;
use crate::vdom::NodeId;
use std::collections::VecDeque;
use std::rc::Rc;

/// How a newly queued message combines with messages already pending for
/// the same coroutine (spec section 4.7).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ReduceOp {
    /// Queues independently of whatever else is pending.
    None,
    /// Supersedes (replaces) an earlier pending message sharing
    /// `(event_type, sub_type, element_value)`.
    Overlay,
    /// Appends this message's `data` onto a prior match's `data` instead of
    /// queuing a second message.
    Reduce,
}

/// A message delivered to a coroutine's queue, or carried across instances
/// through a move buffer (spec sections 4.5.5 and 4.7). Both uses share one
/// shape since cross-instance messages are simply posted onto the target's
/// ordinary per-coroutine queue once re-materialized.
#[derive(Clone, Debug)]
pub struct Message {
    pub event_type: String,
    pub sub_type: String,
    pub source_uri: String,
    /// Identifies which variant/element this message concerns, e.g. for
    /// `Overlay`/`Reduce` matching and for an observer's `is_match`.
    pub element_value: String,
    pub event_name: String,
    pub data: Vec<Variant>,
    pub request_id: String,
    pub reduce_op: ReduceOp,
    /// Which coroutine this message is addressed to, when it arrived
    /// through the runtime instance's external queue rather than already
    /// being posted to a coroutine's own queue (spec section 4.5.5).
    pub target: Option<CoroutineToken>,
}

impl Message {
    fn overlay_key(&self) -> (String, String, String) {
        (
            self.event_type.clone(),
            self.sub_type.clone(),
            self.element_value.clone(),
        )
    }
}

/// FIFO of messages pending for one coroutine, honoring `ReduceOp` merge
/// semantics on push (spec section 4.7).
#[derive(Default)]
pub struct MessageQueue {
    items: VecDeque<Message>,
}

impl MessageQueue {
    pub fn new() -> Self {
        MessageQueue::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Enqueues `msg`, applying its `reduce_op` against whatever is already
    /// pending.
    pub fn push(&mut self, msg: Message) {
        match msg.reduce_op {
            ReduceOp::None => self.items.push_back(msg),
            ReduceOp::Overlay => {
                let key = msg.overlay_key();
                if let Some(slot) = self
                    .items
                    .iter_mut()
                    .find(|m| m.overlay_key() == key)
                {
                    *slot = msg;
                } else {
                    self.items.push_back(msg);
                }
            }
            ReduceOp::Reduce => {
                let key = msg.overlay_key();
                if let Some(slot) = self
                    .items
                    .iter_mut()
                    .find(|m| m.overlay_key() == key)
                {
                    slot.data.extend(msg.data);
                } else {
                    self.items.push_back(msg);
                }
            }
        }
    }

    /// Pulls at most one message, bounding per-coroutine latency per tick
    /// (spec section 4.7).
    pub fn pull_one(&mut self) -> Option<Message> {
        self.items.pop_front()
    }
}

/// A subscription on a variant, optionally scoped to a vDOM element (spec
/// section 4.6). `is_match`/`handle` are plain closures rather than taking
/// an explicit coroutine argument: a Rust closure captures whatever context
/// it needs, the same simplification `variant::listener::OpHandler` makes
/// over the original interpreter's C callback-plus-`ctxt` pattern.
pub type MatchFn = Rc<dyn Fn(&Observer, &Message) -> bool>;
/// Returns `true` if the coroutine should be marked `READY` for another
/// scheduler tick as a result of this dispatch.
pub type HandleFn = Rc<dyn Fn(&Observer, &Message) -> bool>;

#[derive(Clone)]
pub struct Observer {
    pub observed: Variant,
    pub event_type: String,
    /// Empty means "any sub-type matches".
    pub sub_type: String,
    pub scope: Option<NodeId>,
    pub pos: Option<NodeId>,
    pub is_match: MatchFn,
    pub handle: HandleFn,
    pub auto_remove: bool,
    pub cor_stage: Option<Stage>,
    pub cor_state: Option<RunState>,
}

impl Observer {
    /// Whether `self` may dispatch given the coroutine's current
    /// stage/state (spec section 4.6's `cor_stage`/`cor_state` gates).
    pub fn stage_state_ok(&self, stage: Stage, state: RunState) -> bool {
        self.cor_stage.map_or(true, |s| s == stage) && self.cor_state.map_or(true, |s| s == state)
    }
}

/// The two observer lists a coroutine's stack carries (spec section 4.6):
/// scheduler-registered `yield` observers and `<observe>`-registered ones.
#[derive(Default)]
pub struct ObserverSet {
    pub intr_observers: Vec<Observer>,
    pub hvml_observers: Vec<Observer>,
}

impl ObserverSet {
    pub fn new() -> Self {
        ObserverSet::default()
    }

    /// Iterates both lists in registration order, dispatching to every
    /// observer whose `is_match` returns true given the coroutine's current
    /// stage/state. Auto-removing observers are dropped after their first
    /// successful dispatch, invoking `on_revoke`. Returns true if any
    /// observer's `handle` asked for the coroutine to become `READY`.
    pub fn dispatch(
        &mut self,
        msg: &Message,
        stage: Stage,
        state: RunState,
        mut on_revoke: impl FnMut(&Observer),
    ) -> bool {
        let mut became_ready = false;
        for list in [&mut self.intr_observers, &mut self.hvml_observers] {
            let mut to_remove = Vec::new();
            // Snapshot matches first so a handler that registers a new
            // observer mid-dispatch doesn't get re-entered for this event.
            let matched: Vec<usize> = list
                .iter()
                .enumerate()
                .filter(|(_, o)| o.stage_state_ok(stage, state) && (o.is_match)(o, msg))
                .map(|(i, _)| i)
                .collect();
            for idx in matched {
                let observer = list[idx].clone();
                if (observer.handle)(&observer, msg) {
                    became_ready = true;
                }
                if observer.auto_remove {
                    to_remove.push(idx);
                }
            }
            for idx in to_remove.into_iter().rev() {
                let observer = list.remove(idx);
                on_revoke(&observer);
            }
        }
        became_ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::VariantHeap;

    fn msg(event_type: &str) -> Message {
        Message {
            event_type: event_type.to_string(),
            sub_type: String::new(),
            source_uri: String::new(),
            element_value: String::new(),
            event_name: event_type.to_string(),
            data: vec![],
            request_id: String::new(),
            reduce_op: ReduceOp::None,
            target: None,
        }
    }

    #[test]
    fn overlay_replaces_matching_pending_message() {
        let mut q = MessageQueue::new();
        q.push(Message {
            reduce_op: ReduceOp::Overlay,
            ..msg("change")
        });
        q.push(Message {
            reduce_op: ReduceOp::Overlay,
            event_name: "change2".into(),
            ..msg("change")
        });
        assert_eq!(q.len(), 1);
        assert_eq!(q.pull_one().unwrap().event_name, "change2");
    }

    #[test]
    fn reduce_appends_data() {
        let heap = VariantHeap::new();
        let mut q = MessageQueue::new();
        q.push(Message {
            reduce_op: ReduceOp::Reduce,
            data: vec![heap.make_number(1.0)],
            ..msg("tick")
        });
        q.push(Message {
            reduce_op: ReduceOp::Reduce,
            data: vec![heap.make_number(2.0)],
            ..msg("tick")
        });
        assert_eq!(q.len(), 1);
        assert_eq!(q.pull_one().unwrap().data.len(), 2);
    }

    #[test]
    fn pull_one_returns_fifo_order() {
        let mut q = MessageQueue::new();
        q.push(msg("a"));
        q.push(msg("b"));
        assert_eq!(q.pull_one().unwrap().event_type, "a");
        assert_eq!(q.pull_one().unwrap().event_type, "b");
    }

    #[test]
    fn auto_remove_revokes_after_first_dispatch() {
        let heap = VariantHeap::new();
        let mut set = ObserverSet::new();
        set.intr_observers.push(Observer {
            observed: heap.undefined(),
            event_type: "change".into(),
            sub_type: String::new(),
            scope: None,
            pos: None,
            is_match: Rc::new(|o, m| m.event_type == o.event_type),
            handle: Rc::new(|_, _| true),
            auto_remove: true,
            cor_stage: None,
            cor_state: None,
        });
        let mut revoked = false;
        let became_ready = set.dispatch(
            &msg("change"),
            Stage::Observing,
            RunState::Observing,
            |_| revoked = true,
        );
        assert!(became_ready);
        assert!(revoked);
        assert!(set.intr_observers.is_empty());
    }
}
