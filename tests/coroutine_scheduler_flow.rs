//! End-to-end exercise of a coroutine yielding mid-evaluation, being parked
//! by the scheduler, and resuming once its observer matches an incoming
//! message (spec sections 4.5, 4.5.2, 4.6, 4.7).

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use anyhow::Result;
use hvml_core::builder::{Token, VdomBuilder};
use hvml_core::coroutine::{Coroutine, RunState};
use hvml_core::observer::{Message, ReduceOp};
use hvml_core::runtime::Runtime;
use hvml_core::scheduler::{FrameEvaluator, Scheduler, TickOutcome};
use hvml_core::variant::{Variant, VariantData};
use hvml_core::vdom::VdomNode;

fn build_two_element_document() -> Rc<hvml_core::vdom::Document> {
    let mut builder = VdomBuilder::new();
    builder.push_token(Token::StartTag { name: "hvml".into(), self_closing: false });
    builder.push_token(Token::StartTag { name: "body".into(), self_closing: false });
    builder.push_token(Token::StartTag { name: "div".into(), self_closing: false });
    builder.push_token(Token::EndTag { name: "div".into() });
    builder.push_token(Token::EndTag { name: "body".into() });
    builder.push_token(Token::EndTag { name: "hvml".into() });
    builder.push_token(Token::Eof);
    builder.document()
}

/// Evaluates every element's attrs as `undefined`, but yields once on the
/// `div` element until a `resume` message arrives, matching the way a
/// `<observe>`/fetch-driven element would suspend (spec section 4.5.1).
struct YieldOnceEvaluator {
    yielded: Cell<bool>,
    /// Next child index to hand out per element, keyed by node id (the
    /// stack itself can't be used for this: a child frame is popped again
    /// once finished, so its position alone doesn't track progress).
    child_cursor: RefCell<HashMap<hvml_core::vdom::NodeId, usize>>,
}

impl FrameEvaluator for YieldOnceEvaluator {
    fn eval_attrs(&self, co: &Coroutine, frame_index: usize) -> hvml_core::error::PurcResult<Variant> {
        let is_div = co.frames.borrow()[frame_index]
            .element()
            .and_then(|e| e.as_element())
            .and_then(|e| hvml_core::atom::AtomTable::global().to_string(hvml_core::atom::AtomBucket::Def, e.tag))
            .as_deref()
            == Some("div");

        if is_div && !self.yielded.get() {
            self.yielded.set(true);
            co.observers.borrow_mut().intr_observers.push(hvml_core::observer::Observer {
                observed: Variant::from(VariantData::Undefined),
                event_type: "resume".to_string(),
                sub_type: String::new(),
                scope: None,
                pos: None,
                is_match: Rc::new(|o, m| m.event_type == o.event_type),
                handle: Rc::new(|_, _| true),
                auto_remove: true,
                cor_stage: None,
                cor_state: None,
            });
            co.set_state(RunState::Observing);
        }
        Ok(Variant::from(VariantData::Undefined))
    }

    fn eval_content(&self, _co: &Coroutine, _frame_index: usize) -> hvml_core::error::PurcResult<Variant> {
        Ok(Variant::from(VariantData::Undefined))
    }

    fn next_child(&self, co: &Coroutine, frame_index: usize) -> Option<Rc<VdomNode>> {
        let element = co.frames.borrow()[frame_index].element()?.clone();
        let children = element.children();
        let mut cursor = self.child_cursor.borrow_mut();
        let next = cursor.entry(element.id()).or_insert(0);
        let child = children.get(*next).cloned();
        if child.is_some() {
            *next += 1;
        }
        child
    }
}

#[test]
fn coroutine_parks_on_yield_and_resumes_on_matching_message() -> Result<()> {
    let rt = Runtime::new();
    let doc = build_two_element_document();
    let co = rt.spawn(doc, None);
    let scheduler = Scheduler::new(rt.clone());
    let evaluator = YieldOnceEvaluator { yielded: Cell::new(false) };

    // Run ticks until the coroutine parks in OBSERVING.
    for _ in 0..10 {
        if co.state() == RunState::Observing {
            break;
        }
        scheduler.tick(0, &evaluator);
    }
    assert_eq!(co.state(), RunState::Observing);
    assert_eq!(co.observers.borrow().intr_observers.len(), 1);

    // Post the message the registered observer is waiting for.
    scheduler.post(
        co.token,
        Message {
            event_type: "resume".to_string(),
            sub_type: String::new(),
            source_uri: String::new(),
            element_value: String::new(),
            event_name: "resume".to_string(),
            data: vec![],
            request_id: String::new(),
            reduce_op: ReduceOp::None,
            target: None,
        },
    );

    let mut outcome = scheduler.tick(0, &evaluator);
    assert!(co.observers.borrow().intr_observers.is_empty());

    // Keep ticking until the coroutine finishes its (trivially small) tree.
    for _ in 0..20 {
        if outcome == TickOutcome::Exit || co.state() == RunState::Exited {
            break;
        }
        outcome = scheduler.tick(0, &evaluator);
    }
    assert_eq!(co.state(), RunState::Exited);
    Ok(())
}
