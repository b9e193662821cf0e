//! Scoped variables (spec section 3.6): a per-element namespace tree that a
//! coroutine's open-element chain is looked up against, innermost scope
//! first, falling through to the document-global namespace.

use crate::error::{fail, PurcError, PurcResult};
use crate::variant::Variant;
use crate::vdom::NodeId;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A scope is keyed by the vDOM element it's attached to. The document
/// itself (`NodeId(0)`) doubles as the coroutine-global namespace.
pub type ElementKey = NodeId;

/// Where a `$` binding targets, relative to the current open-element chain
/// (spec section 3.6).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScopeLevel {
    Current,
    Parent,
    Grandparent,
    /// The outermost scope in the chain (the element nearest the document).
    Root,
    /// The innermost scope in the chain (same as `Current`, named
    /// separately because the grammar spells it differently).
    Last,
    NextToLast,
    /// Same target as `Root`; kept distinct because HVML source spells it
    /// `$TOPMOST` as an alias.
    Topmost,
}

/// The name/value bindings attached to one element, plus an optional label
/// (`#id`) a binding can target directly instead of by chain position.
#[derive(Default)]
pub struct VariableManager {
    vars: RefCell<BTreeMap<String, Variant>>,
    label: RefCell<Option<String>>,
}

impl VariableManager {
    pub fn new() -> Self {
        VariableManager::default()
    }

    pub fn get(&self, name: &str) -> Option<Variant> {
        self.vars.borrow().get(name).map(Variant::make_ref)
    }

    pub fn define(&self, name: &str, value: Variant) {
        self.vars.borrow_mut().insert(name.to_string(), value);
    }

    pub fn undefine(&self, name: &str) -> bool {
        self.vars.borrow_mut().remove(name).is_some()
    }

    pub fn label(&self) -> Option<String> {
        self.label.borrow().clone()
    }

    pub fn set_label(&self, label: impl Into<String>) {
        *self.label.borrow_mut() = Some(label.into());
    }
}

/// The full set of per-element scopes for one coroutine (spec section 3.6).
#[derive(Default)]
pub struct ScopedVarTree {
    scopes: RefCell<BTreeMap<ElementKey, Rc<RefCell<VariableManager>>>>,
}

impl ScopedVarTree {
    pub fn new() -> Self {
        ScopedVarTree::default()
    }

    /// Returns the scope for `key`, creating an empty one on first use.
    pub fn scope_for(&self, key: ElementKey) -> Rc<RefCell<VariableManager>> {
        self.scopes
            .borrow_mut()
            .entry(key)
            .or_insert_with(|| Rc::new(RefCell::new(VariableManager::new())))
            .clone()
    }

    pub fn define(&self, key: ElementKey, name: &str, value: Variant) {
        self.scope_for(key).borrow().define(name, value);
    }

    /// Walks `chain` (root-to-innermost order) from innermost outward,
    /// returning the first scope that binds `name`.
    pub fn lookup(&self, chain: &[ElementKey], name: &str) -> Option<Variant> {
        for key in chain.iter().rev() {
            if let Some(scope) = self.scopes.borrow().get(key) {
                if let Some(v) = scope.borrow().get(name) {
                    return Some(v);
                }
            }
        }
        None
    }

    /// Resolves `level` against `chain` (root-to-innermost order) to the
    /// element key a binding at that level would target.
    pub fn resolve_level(&self, chain: &[ElementKey], level: ScopeLevel) -> PurcResult<ElementKey> {
        let len = chain.len();
        let idx = match level {
            ScopeLevel::Current | ScopeLevel::Last => len.checked_sub(1),
            ScopeLevel::Parent | ScopeLevel::NextToLast => len.checked_sub(2),
            ScopeLevel::Grandparent => len.checked_sub(3),
            ScopeLevel::Root | ScopeLevel::Topmost => {
                if len == 0 {
                    None
                } else {
                    Some(0)
                }
            }
        };
        idx.and_then(|i| chain.get(i)).copied().ok_or(PurcError::NotExists)
    }

    pub fn bind_at_level(
        &self,
        chain: &[ElementKey],
        level: ScopeLevel,
        name: &str,
        value: Variant,
    ) -> PurcResult<()> {
        let key = self.resolve_level(chain, level)?;
        self.define(key, name, value);
        Ok(())
    }

    /// Finds the scope whose element was labeled `#id` via
    /// [`VariableManager::set_label`].
    pub fn lookup_labeled(&self, label: &str) -> PurcResult<Rc<RefCell<VariableManager>>> {
        self.scopes
            .borrow()
            .values()
            .find(|s| s.borrow().label().as_deref() == Some(label))
            .cloned()
            .map(Ok)
            .unwrap_or_else(|| fail(PurcError::NotExists))
    }

    pub fn remove_scope(&self, key: ElementKey) {
        self.scopes.borrow_mut().remove(&key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::{VariantData, VariantHeap};

    fn as_str(v: &Variant) -> String {
        match v.data() {
            VariantData::String(s) => s.to_string(),
            _ => panic!("expected a string variant"),
        }
    }

    #[test]
    fn lookup_walks_innermost_to_outermost() {
        let heap = VariantHeap::new();
        let tree = ScopedVarTree::new();
        tree.define(NodeId(0), "name", heap.make_string("root"));
        tree.define(NodeId(2), "name", heap.make_string("inner"));
        let chain = [NodeId(0), NodeId(1), NodeId(2)];
        let v = tree.lookup(&chain, "name").unwrap();
        assert_eq!(as_str(&v), "inner");

        let chain_no_inner_binding = [NodeId(0), NodeId(1)];
        let v = tree.lookup(&chain_no_inner_binding, "name").unwrap();
        assert_eq!(as_str(&v), "root");
    }

    #[test]
    fn resolve_level_targets_expected_positions() {
        let tree = ScopedVarTree::new();
        let chain = [NodeId(0), NodeId(1), NodeId(2)];
        assert_eq!(tree.resolve_level(&chain, ScopeLevel::Last).unwrap(), NodeId(2));
        assert_eq!(tree.resolve_level(&chain, ScopeLevel::Parent).unwrap(), NodeId(1));
        assert_eq!(
            tree.resolve_level(&chain, ScopeLevel::Grandparent).unwrap(),
            NodeId(0)
        );
        assert_eq!(tree.resolve_level(&chain, ScopeLevel::Root).unwrap(), NodeId(0));
        assert!(tree.resolve_level(&[NodeId(0)], ScopeLevel::Grandparent).is_err());
    }

    #[test]
    fn labeled_scope_is_found_across_the_tree() {
        let tree = ScopedVarTree::new();
        tree.scope_for(NodeId(5)).borrow().set_label("outer");
        let found = tree.lookup_labeled("outer").unwrap();
        assert_eq!(found.borrow().label().as_deref(), Some("outer"));
        assert!(tree.lookup_labeled("missing").is_err());
    }
}
