//! The vDOM construction state machine (spec section 4.4): a tokenizer-fed
//! tree builder with HTML5-style insertion modes. The tokenizer/parser
//! itself is out of scope (spec section 1) — this module only consumes the
//! token stream via [`VdomBuilder::push_token`].

use crate::atom::{AtomBucket, AtomTable};
use crate::variant::ejson::EjsonNode;
use crate::vdom::{Comment, Content, Document, Element, VdomNode};
use std::cell::RefCell;
use std::rc::Rc;

/// One token fed by the (external) tokenizer (spec section 4.4).
#[derive(Clone, Debug)]
pub enum Token {
    Doctype(Option<String>),
    StartTag { name: String, self_closing: bool },
    EndTag { name: String },
    Comment(String),
    Character(String),
    VcmTree(EjsonNode),
    Eof,
}

/// The builder's current insertion mode (spec section 4.4).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum InsertionMode {
    Initial,
    BeforeHvml,
    InHvml,
    BeforeHead,
    InHead,
    AfterHead,
    InBody,
    AfterBody,
    AfterAfterBody,
}

/// What happened to one `push_token` call, for callers (tests, the `run`
/// collaborator) that want to observe builder errors without the builder
/// aborting (spec section 4.4's `AFTER_BODY`/`AFTER_AFTER_BODY` note that
/// "the builder continues in silently mode").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuilderError(pub String);

pub struct VdomBuilder {
    document: Rc<Document>,
    mode: InsertionMode,
    open_stack: Vec<Rc<VdomNode>>,
    errors: RefCell<Vec<BuilderError>>,
    atoms: &'static AtomTable,
    finished: bool,
}

fn is_whitespace(s: &str) -> bool {
    s.chars().all(char::is_whitespace)
}

impl VdomBuilder {
    pub fn new() -> Self {
        VdomBuilder {
            document: Document::new(),
            mode: InsertionMode::Initial,
            open_stack: Vec::new(),
            errors: RefCell::new(Vec::new()),
            atoms: AtomTable::global(),
            finished: false,
        }
    }

    pub fn document(&self) -> Rc<Document> {
        self.document.clone()
    }

    pub fn mode(&self) -> InsertionMode {
        self.mode
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn errors(&self) -> Vec<BuilderError> {
        self.errors.borrow().clone()
    }

    fn record_error(&self, msg: impl Into<String>) {
        self.errors.borrow_mut().push(BuilderError(msg.into()));
    }

    fn current(&self) -> Option<Rc<VdomNode>> {
        self.open_stack.last().cloned()
    }

    fn make_element(&mut self, name: &str, self_closing: bool) -> Rc<VdomNode> {
        let tag = self.atoms.from_string(AtomBucket::Def, name);
        Rc::new(VdomNode::Element(Element {
            id: self.document.alloc_id(),
            tag,
            attrs: RefCell::new(Vec::new()),
            children: RefCell::new(Vec::new()),
            self_closing: std::cell::Cell::new(self_closing),
        }))
    }

    fn tag_matches(node: &VdomNode, name: &str, atoms: &AtomTable) -> bool {
        node.as_element()
            .map(|e| atoms.to_string(AtomBucket::Def, e.tag).as_deref() == Some(name))
            .unwrap_or(false)
    }

    /// Pops open elements until one matching `name` is found and popped too
    /// (spec section 4.4's "pop intermediate unrecognized elements and then
    /// the matching one"). Records an error and pops nothing if no match
    /// exists anywhere on the stack.
    fn close_matching(&mut self, name: &str) {
        let pos = self
            .open_stack
            .iter()
            .rposition(|n| Self::tag_matches(n, name, self.atoms));
        match pos {
            Some(pos) => {
                self.open_stack.truncate(pos);
            }
            None => self.record_error(format!("end tag </{}> has no matching open element", name)),
        }
    }

    /// Feeds one token through the state machine, looping internally while
    /// a step asks for reprocessing under a new mode (spec section 4.4's
    /// `reprocess` flag).
    pub fn push_token(&mut self, mut token: Token) {
        loop {
            match self.step(&token) {
                StepResult::Done => break,
                StepResult::Reprocess => continue,
                StepResult::ReprocessWith(next) => token = next,
            }
        }
    }

    fn step(&mut self, token: &Token) -> StepResult {
        match self.mode {
            InsertionMode::Initial => self.step_initial(token),
            InsertionMode::BeforeHvml => self.step_before_hvml(token),
            InsertionMode::BeforeHead => self.step_before_head(token),
            InsertionMode::AfterHead => self.step_after_head(token),
            InsertionMode::InHvml | InsertionMode::InHead | InsertionMode::InBody => {
                self.step_generic(token)
            }
            InsertionMode::AfterBody | InsertionMode::AfterAfterBody => self.step_after_body(token),
        }
    }

    fn step_initial(&mut self, token: &Token) -> StepResult {
        match token {
            Token::Doctype(name) => {
                *self.document.doctype.borrow_mut() = name.clone();
                self.mode = InsertionMode::BeforeHvml;
                StepResult::Done
            }
            Token::StartTag { .. } => {
                *self.document.doctype.borrow_mut() = Some("hvml".to_string());
                self.mode = InsertionMode::BeforeHvml;
                StepResult::Reprocess
            }
            Token::Comment(text) => {
                let node = Rc::new(VdomNode::Comment(Comment {
                    id: self.document.alloc_id(),
                    text: text.clone(),
                }));
                self.document.top_level_comments.borrow_mut().push(node);
                StepResult::Done
            }
            Token::Character(s) if !is_whitespace(s) => {
                self.record_error("unexpected character token before DOCTYPE");
                StepResult::Done
            }
            Token::VcmTree(_) => {
                self.record_error("unexpected content before DOCTYPE");
                StepResult::Done
            }
            _ => StepResult::Done,
        }
    }

    fn open_root(&mut self, name: &str, self_closing: bool) {
        let root = self.make_element(name, self_closing);
        *self.document.root.borrow_mut() = Some(root.clone());
        self.open_stack.push(root);
        self.mode = InsertionMode::BeforeHead;
    }

    fn step_before_hvml(&mut self, token: &Token) -> StepResult {
        match token {
            Token::StartTag { name, self_closing } if name == "hvml" => {
                self.open_root(name, *self_closing);
                StepResult::Done
            }
            Token::StartTag { .. } => {
                self.open_root("hvml", false);
                StepResult::Reprocess
            }
            Token::Comment(text) => {
                let node = Rc::new(VdomNode::Comment(Comment {
                    id: self.document.alloc_id(),
                    text: text.clone(),
                }));
                self.document.top_level_comments.borrow_mut().push(node);
                StepResult::Done
            }
            Token::Eof => {
                self.open_root("hvml", false);
                StepResult::Reprocess
            }
            Token::Character(s) if is_whitespace(s) => StepResult::Done,
            _ => {
                self.record_error("unexpected token before <hvml>");
                StepResult::Done
            }
        }
    }

    fn step_before_head(&mut self, token: &Token) -> StepResult {
        match token {
            Token::StartTag { name, self_closing } if name == "head" => {
                let head = self.make_element(name, *self_closing);
                if let Some(root) = self.current() {
                    let _ = root.push_child(head.clone());
                }
                *self.document.head.borrow_mut() = Some(head.clone());
                if !*self_closing {
                    self.open_stack.push(head);
                }
                self.mode = InsertionMode::InHead;
                StepResult::Done
            }
            Token::StartTag { name, .. } if name == "body" => {
                let head = self.make_element("head", false);
                if let Some(root) = self.current() {
                    let _ = root.push_child(head.clone());
                }
                *self.document.head.borrow_mut() = Some(head);
                self.mode = InsertionMode::AfterHead;
                StepResult::Reprocess
            }
            Token::EndTag { name } if name == "hvml" => {
                self.open_stack.clear();
                self.mode = InsertionMode::AfterAfterBody;
                StepResult::Done
            }
            Token::Eof => {
                let head = self.make_element("head", false);
                if let Some(root) = self.current() {
                    let _ = root.push_child(head.clone());
                }
                *self.document.head.borrow_mut() = Some(head);
                self.mode = InsertionMode::AfterHead;
                StepResult::Reprocess
            }
            Token::Comment(text) => {
                if let Some(cur) = self.current() {
                    let node = Rc::new(VdomNode::Comment(Comment {
                        id: self.document.alloc_id(),
                        text: text.clone(),
                    }));
                    let _ = cur.push_child(node);
                }
                StepResult::Done
            }
            Token::Character(s) if is_whitespace(s) => StepResult::Done,
            _ => {
                self.mode = InsertionMode::InHvml;
                StepResult::Reprocess
            }
        }
    }

    fn step_after_head(&mut self, token: &Token) -> StepResult {
        match token {
            Token::StartTag { name, self_closing } if name == "body" => {
                let body = self.make_element(name, *self_closing);
                if let Some(root) = self.current() {
                    let _ = root.push_child(body.clone());
                }
                *self.document.body.borrow_mut() = Some(body.clone());
                self.document.bodies.borrow_mut().push(body.clone());
                if !*self_closing {
                    self.open_stack.push(body);
                }
                self.mode = InsertionMode::InBody;
                StepResult::Done
            }
            Token::Eof => {
                let body = self.make_element("body", false);
                if let Some(root) = self.current() {
                    let _ = root.push_child(body.clone());
                }
                *self.document.body.borrow_mut() = Some(body.clone());
                self.document.bodies.borrow_mut().push(body.clone());
                self.mode = InsertionMode::InBody;
                StepResult::Reprocess
            }
            Token::Character(s) if is_whitespace(s) => StepResult::Done,
            Token::Comment(text) => {
                if let Some(cur) = self.current() {
                    let node = Rc::new(VdomNode::Comment(Comment {
                        id: self.document.alloc_id(),
                        text: text.clone(),
                    }));
                    let _ = cur.push_child(node);
                }
                StepResult::Done
            }
            _ => {
                self.mode = InsertionMode::InBody;
                StepResult::Reprocess
            }
        }
    }

    fn step_generic(&mut self, token: &Token) -> StepResult {
        match token {
            Token::StartTag { name, self_closing } => {
                if self.mode == InsertionMode::InBody && name == "body" {
                    let body = self.make_element(name, *self_closing);
                    if let Some(root) = self.document.root.borrow().clone() {
                        let _ = root.push_child(body.clone());
                    }
                    self.document.bodies.borrow_mut().push(body.clone());
                    if !*self_closing {
                        self.open_stack.push(body);
                    }
                    return StepResult::Done;
                }
                let el = self.make_element(name, *self_closing);
                if let Some(cur) = self.current() {
                    let _ = cur.push_child(el.clone());
                } else {
                    *self.document.root.borrow_mut() = Some(el.clone());
                }
                if !*self_closing {
                    self.open_stack.push(el);
                }
                StepResult::Done
            }
            Token::EndTag { name } => {
                if self.mode == InsertionMode::InHead && name == "head" {
                    self.close_matching(name);
                    self.mode = InsertionMode::AfterHead;
                    return StepResult::Done;
                }
                if self.mode == InsertionMode::InBody && name == "body" {
                    self.close_matching(name);
                    self.mode = InsertionMode::AfterBody;
                    return StepResult::Done;
                }
                self.close_matching(name);
                StepResult::Done
            }
            Token::Comment(text) => {
                if let Some(cur) = self.current() {
                    let node = Rc::new(VdomNode::Comment(Comment {
                        id: self.document.alloc_id(),
                        text: text.clone(),
                    }));
                    let _ = cur.push_child(node);
                }
                StepResult::Done
            }
            Token::Character(s) if is_whitespace(s) => StepResult::Done,
            Token::Character(s) => {
                if let Some(cur) = self.current() {
                    let node = Rc::new(VdomNode::Content(Content {
                        id: self.document.alloc_id(),
                        expr: RefCell::new(EjsonNode::String(s.clone())),
                    }));
                    let _ = cur.push_child(node);
                }
                StepResult::Done
            }
            Token::VcmTree(tree) => {
                if matches!(tree, EjsonNode::String(s) if is_whitespace(s)) {
                    return StepResult::Done;
                }
                if let Some(cur) = self.current() {
                    let node = Rc::new(VdomNode::Content(Content {
                        id: self.document.alloc_id(),
                        expr: RefCell::new(tree.clone()),
                    }));
                    let _ = cur.push_child(node);
                }
                StepResult::Done
            }
            Token::Eof => {
                self.finished = true;
                StepResult::Done
            }
            Token::Doctype(_) => {
                self.record_error("unexpected DOCTYPE");
                StepResult::Done
            }
        }
    }

    fn step_after_body(&mut self, token: &Token) -> StepResult {
        match token {
            Token::Comment(_) => StepResult::Done,
            Token::Character(s) if is_whitespace(s) => StepResult::Done,
            Token::Eof => {
                self.finished = true;
                StepResult::Done
            }
            _ => {
                self.record_error("unexpected token after </body>");
                StepResult::Done
            }
        }
    }
}

impl Default for VdomBuilder {
    fn default() -> Self {
        Self::new()
    }
}

enum StepResult {
    Done,
    /// Re-run `step` with the exact same token (a mode transition occurred).
    Reprocess,
    /// Re-run `step` with a different token (used nowhere yet, kept for
    /// tokenizer-mode-switch hooks a host's `push_token(gen, parser, ...)`
    /// collaborator may need).
    #[allow(dead_code)]
    ReprocessWith(Token),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_name(atoms: &AtomTable, node: &Rc<VdomNode>) -> String {
        node.tag_name(atoms).unwrap()
    }

    #[test]
    fn minimal_document_has_head_and_body() {
        let mut b = VdomBuilder::new();
        b.push_token(Token::Doctype(Some("hvml".into())));
        b.push_token(Token::StartTag {
            name: "hvml".into(),
            self_closing: false,
        });
        b.push_token(Token::StartTag {
            name: "head".into(),
            self_closing: false,
        });
        b.push_token(Token::EndTag { name: "head".into() });
        b.push_token(Token::StartTag {
            name: "body".into(),
            self_closing: false,
        });
        b.push_token(Token::Eof);

        let doc = b.document();
        let atoms = AtomTable::global();
        let root = doc.root.borrow().clone().unwrap();
        assert_eq!(tag_name(atoms, &root), "hvml");
        assert_eq!(tag_name(atoms, &doc.head.borrow().clone().unwrap()), "head");
        assert_eq!(tag_name(atoms, &doc.body.borrow().clone().unwrap()), "body");
        assert_eq!(doc.bodies.borrow().len(), 1);
        assert!(b.errors().is_empty());
    }

    #[test]
    fn start_tag_without_doctype_synthesizes_one() {
        let mut b = VdomBuilder::new();
        b.push_token(Token::StartTag {
            name: "hvml".into(),
            self_closing: false,
        });
        b.push_token(Token::Eof);
        assert_eq!(b.document().doctype.borrow().as_deref(), Some("hvml"));
    }

    #[test]
    fn self_closing_start_tag_does_not_open() {
        let mut b = VdomBuilder::new();
        b.push_token(Token::StartTag {
            name: "hvml".into(),
            self_closing: true,
        });
        assert_eq!(b.open_stack.len(), 0);
    }

    #[test]
    fn non_self_closing_start_tag_pushes_one_level() {
        let mut b = VdomBuilder::new();
        b.push_token(Token::StartTag {
            name: "hvml".into(),
            self_closing: false,
        });
        assert_eq!(b.open_stack.len(), 1);
    }

    #[test]
    fn mismatched_end_tag_pops_intermediate_elements() {
        let mut b = VdomBuilder::new();
        b.push_token(Token::StartTag { name: "hvml".into(), self_closing: false });
        b.push_token(Token::StartTag { name: "head".into(), self_closing: false });
        b.push_token(Token::EndTag { name: "head".into() });
        b.push_token(Token::StartTag { name: "body".into(), self_closing: false });
        b.push_token(Token::StartTag { name: "div".into(), self_closing: false });
        b.push_token(Token::StartTag { name: "span".into(), self_closing: false });
        // closing "div" should pop span then div.
        b.push_token(Token::EndTag { name: "div".into() });
        assert_eq!(b.open_stack.len(), 2); // hvml, body
    }

    #[test]
    fn unmatched_end_tag_reports_error_without_corrupting_tree() {
        let mut b = VdomBuilder::new();
        b.push_token(Token::StartTag { name: "hvml".into(), self_closing: false });
        b.push_token(Token::EndTag { name: "nonexistent".into() });
        assert_eq!(b.open_stack.len(), 1);
        assert!(!b.errors().is_empty());
    }

    #[test]
    fn ends_in_after_body_or_after_after_body() {
        let mut b = VdomBuilder::new();
        b.push_token(Token::Doctype(Some("hvml".into())));
        b.push_token(Token::StartTag { name: "hvml".into(), self_closing: false });
        b.push_token(Token::StartTag { name: "head".into(), self_closing: false });
        b.push_token(Token::EndTag { name: "head".into() });
        b.push_token(Token::StartTag { name: "body".into(), self_closing: false });
        b.push_token(Token::EndTag { name: "body".into() });
        b.push_token(Token::Eof);
        assert!(matches!(
            b.mode(),
            InsertionMode::AfterBody | InsertionMode::AfterAfterBody
        ));
    }
}
