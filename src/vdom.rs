//! The vDOM tree (spec section 3.4): a rooted tree of `document`, `element`,
//! `content` and `comment` nodes. Built incrementally by [`crate::builder`],
//! then treated as read-only and shared by `Rc` across coroutines once a
//! document's `EOF` token has been processed.

use crate::atom::Atom;
use crate::error::{fail, PurcError, PurcResult};
use crate::variant::ejson::EjsonNode;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Stable identity for a vDOM node, used to key the scoped-variable tree
/// (spec section 3.6) without pinning raw pointers.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub usize);

/// How an attribute's value expression combines with the element's prior
/// value. The original interpreter special-cases string attributes with
/// regex and wildcard substitution forms; spec section 9's open question
/// asks for a single normalized grammar, which this is (section 4.4's
/// redesign-flag territory).
#[derive(Clone, Debug)]
pub enum AttrOperator {
    /// Plain assignment: the attribute's value becomes the expression's
    /// evaluation result.
    Assign,
    /// `/pattern/replacement/`: substitutes the first regex match.
    Regex { pattern: String, replacement: String },
    /// `pattern replacement` (space-separated, no delimiters): substitutes
    /// the first literal occurrence of `pattern`.
    Wildcard { pattern: String, replacement: String },
}

#[derive(Clone, Debug)]
pub struct Attribute {
    pub name: String,
    pub operator: AttrOperator,
    pub expr: EjsonNode,
}

pub struct Element {
    pub id: NodeId,
    pub tag: Atom,
    pub attrs: RefCell<Vec<Attribute>>,
    pub children: RefCell<Vec<Rc<VdomNode>>>,
    pub self_closing: Cell<bool>,
}

pub struct Content {
    pub id: NodeId,
    pub expr: RefCell<EjsonNode>,
}

pub struct Comment {
    pub id: NodeId,
    pub text: String,
}

/// The document owns `root` (the `hvml` element), `head`, the primary
/// `body`, and every top-level `body` sibling (spec section 3.4).
pub struct Document {
    pub id: NodeId,
    pub doctype: RefCell<Option<String>>,
    pub root: RefCell<Option<Rc<VdomNode>>>,
    pub head: RefCell<Option<Rc<VdomNode>>>,
    pub body: RefCell<Option<Rc<VdomNode>>>,
    pub bodies: RefCell<Vec<Rc<VdomNode>>>,
    /// Comments seen before `root` exists (`INITIAL`/`BEFORE_HVML`), which
    /// have nowhere else to attach (spec section 4.4).
    pub top_level_comments: RefCell<Vec<Rc<VdomNode>>>,
    next_id: Cell<usize>,
}

impl Document {
    pub fn new() -> Rc<Document> {
        Rc::new(Document {
            id: NodeId(0),
            doctype: RefCell::new(None),
            root: RefCell::new(None),
            head: RefCell::new(None),
            body: RefCell::new(None),
            bodies: RefCell::new(Vec::new()),
            top_level_comments: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        })
    }

    pub fn alloc_id(&self) -> NodeId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        NodeId(id)
    }
}

pub enum VdomNode {
    Element(Element),
    Content(Content),
    Comment(Comment),
}

impl VdomNode {
    pub fn id(&self) -> NodeId {
        match self {
            VdomNode::Element(e) => e.id,
            VdomNode::Content(c) => c.id,
            VdomNode::Comment(c) => c.id,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            VdomNode::Element(e) => Some(e),
            _ => None,
        }
    }

    pub fn tag_name(&self, atoms: &crate::atom::AtomTable) -> Option<String> {
        self.as_element()
            .and_then(|e| atoms.to_string(crate::atom::AtomBucket::Def, e.tag))
    }

    /// Appends `child` to this node's child list. Only `Element` nodes may
    /// have children; any other target fails with `InvalidValue`.
    pub fn push_child(self: &Rc<Self>, child: Rc<VdomNode>) -> PurcResult<()> {
        match self.as_ref() {
            VdomNode::Element(e) => {
                e.children.borrow_mut().push(child);
                Ok(())
            }
            _ => fail(PurcError::InvalidValue),
        }
    }

    pub fn children(&self) -> Vec<Rc<VdomNode>> {
        match self {
            VdomNode::Element(e) => e.children.borrow().clone(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::AtomBucket;

    #[test]
    fn element_accepts_children_other_kinds_reject() {
        let doc = Document::new();
        let atom = crate::atom::AtomTable::global().from_string(AtomBucket::Def, "div");
        let el = Rc::new(VdomNode::Element(Element {
            id: doc.alloc_id(),
            tag: atom,
            attrs: RefCell::new(vec![]),
            children: RefCell::new(vec![]),
            self_closing: Cell::new(false),
        }));
        let comment = Rc::new(VdomNode::Comment(Comment {
            id: doc.alloc_id(),
            text: "hi".into(),
        }));
        el.push_child(comment.clone()).unwrap();
        assert_eq!(el.children().len(), 1);
        assert!(comment.push_child(el.clone()).is_err());
    }
}
