//! Child coroutines (spec section 4.5.4): a coroutine spawned either from
//! an already-parsed vDOM subtree or as a synthesized `<call>` wrapper
//! program, tracked by the spawning coroutine as its curator.

use crate::coroutine::CoroutineToken;
use crate::vdom::Document;
use std::rc::Rc;

/// What a child coroutine is built from.
pub enum ChildSpec {
    /// An already-parsed vDOM subtree, e.g. from `load`/`register`.
    Vdom(Rc<Document>),
    /// A synthesized call-wrapper program, handed to a [`ParserHook`] the
    /// host implements -- this crate never invokes a parser itself (out of
    /// scope per spec section 1).
    CallWrapper {
        target: String,
        callee: String,
        args_expr: String,
    },
}

impl ChildSpec {
    pub fn call_wrapper(callee: impl Into<String>, args_expr: impl Into<String>) -> ChildSpec {
        ChildSpec::CallWrapper {
            target: "void".to_string(),
            callee: callee.into(),
            args_expr: args_expr.into(),
        }
    }

    /// Synthesizes the `<hvml target="void"><call on $callee with
    /// $REQ._args /></hvml>` source the original interpreter builds for a
    /// call-wrapper child, for a host's [`ParserHook`] to parse. Returns
    /// `None` for [`ChildSpec::Vdom`], which needs no synthesis.
    pub fn synthesize_source(&self) -> Option<String> {
        match self {
            ChildSpec::Vdom(_) => None,
            ChildSpec::CallWrapper {
                target,
                callee,
                args_expr,
            } => Some(format!(
                "<hvml target=\"{target}\"><body><call on \"${callee}\" with {args_expr} /></body></hvml>"
            )),
        }
    }
}

/// Implemented by the host to turn a synthesized source string into a
/// parsed vDOM document. This crate only produces the string: the
/// tokenizer/parser is out of scope per spec section 1.
pub trait ParserHook {
    fn parse(&self, source: &str) -> Option<Rc<Document>>;
}

/// The curator relationship a spawned child keeps with its parent (spec
/// section 4.5.4): `callState`/`subExit`/`lastMsg` messages posted to the
/// curator are tagged with `child`.
#[derive(Clone, Copy, Debug)]
pub struct ChildLink {
    pub child: CoroutineToken,
    pub curator: CoroutineToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_wrapper_synthesizes_expected_source() {
        let spec = ChildSpec::call_wrapper("greet", "$REQ._args");
        let src = spec.synthesize_source().unwrap();
        assert!(src.contains("on \"$greet\""));
        assert!(src.contains("with $REQ._args"));
    }

    #[test]
    fn vdom_spec_needs_no_synthesis() {
        let spec = ChildSpec::Vdom(Document::new());
        assert!(spec.synthesize_source().is_none());
    }
}
