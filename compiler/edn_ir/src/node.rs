//! The symbolic node tree.
//!
//! A [`Node`] is a tagged value ([`NodeKind`]) plus a metadata side table.
//! The shape of a tree is treated as copy-on-write: rewriting produces new
//! nodes and leaves the input alone. Metadata is the exception: passes
//! annotate it in place through a shared reference, so it sits behind a
//! `RefCell`.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;

use crate::span::{Position, Span};

/// Named metadata entries attached to a node.
///
/// Ordered so that printing and snapshotting are deterministic.
pub type Metadata = BTreeMap<String, Node>;

/// The value carried by a [`Node`].
#[derive(Clone, Debug, PartialEq, Default)]
pub enum NodeKind {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Keyword(String),
    Symbol(String),
    /// Ordered list; the first element usually names an operation.
    List(Vec<Node>),
    /// Ordered sequence, used for bodies and argument lists.
    Vector(Vec<Node>),
    Set(Vec<Node>),
    /// Map entries in source order.
    Map(Vec<(Node, Node)>),
    /// `#tag value`
    Tagged { tag: String, value: Box<Node> },
}

impl NodeKind {
    /// Short name of the variant, for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            NodeKind::Nil => "nil",
            NodeKind::Bool(_) => "bool",
            NodeKind::Int(_) => "int",
            NodeKind::Float(_) => "float",
            NodeKind::Str(_) => "string",
            NodeKind::Keyword(_) => "keyword",
            NodeKind::Symbol(_) => "symbol",
            NodeKind::List(_) => "list",
            NodeKind::Vector(_) => "vector",
            NodeKind::Set(_) => "set",
            NodeKind::Map(_) => "map",
            NodeKind::Tagged { .. } => "tagged",
        }
    }
}

/// A node of the symbolic tree.
///
/// Metadata does not participate in equality: two nodes are equal when
/// their shapes and atoms are equal.
#[derive(Clone, Debug, Default)]
pub struct Node {
    kind: NodeKind,
    meta: RefCell<Metadata>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl From<NodeKind> for Node {
    fn from(kind: NodeKind) -> Self {
        Node::new(kind)
    }
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            kind,
            meta: RefCell::new(Metadata::new()),
        }
    }

    // Constructors

    pub fn nil() -> Self {
        Node::new(NodeKind::Nil)
    }

    pub fn boolean(value: bool) -> Self {
        Node::new(NodeKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Node::new(NodeKind::Int(value))
    }

    pub fn float(value: f64) -> Self {
        Node::new(NodeKind::Float(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Node::new(NodeKind::Str(value.into()))
    }

    pub fn keyword(name: impl Into<String>) -> Self {
        Node::new(NodeKind::Keyword(name.into()))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Node::new(NodeKind::Symbol(name.into()))
    }

    pub fn list(items: Vec<Node>) -> Self {
        Node::new(NodeKind::List(items))
    }

    pub fn vector(items: Vec<Node>) -> Self {
        Node::new(NodeKind::Vector(items))
    }

    pub fn set(items: Vec<Node>) -> Self {
        Node::new(NodeKind::Set(items))
    }

    pub fn map(entries: Vec<(Node, Node)>) -> Self {
        Node::new(NodeKind::Map(entries))
    }

    pub fn tagged(tag: impl Into<String>, value: Node) -> Self {
        Node::new(NodeKind::Tagged {
            tag: tag.into(),
            value: Box::new(value),
        })
    }

    /// Build a node of a new shape that keeps this node's metadata.
    #[must_use]
    pub fn rebuild(&self, kind: NodeKind) -> Node {
        Node {
            kind,
            meta: RefCell::new(self.meta.borrow().clone()),
        }
    }

    // Shape access

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn into_kind(self) -> NodeKind {
        self.kind
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, NodeKind::List(_))
    }

    /// True for every variant that has no children.
    pub fn is_atom(&self) -> bool {
        !matches!(
            self.kind,
            NodeKind::List(_)
                | NodeKind::Vector(_)
                | NodeKind::Set(_)
                | NodeKind::Map(_)
                | NodeKind::Tagged { .. }
        )
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Keyword(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self.kind {
            NodeKind::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            NodeKind::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[Node]> {
        match &self.kind {
            NodeKind::Vector(items) => Some(items),
            _ => None,
        }
    }

    /// Symbol or string contents. Many forms accept either for names.
    pub fn as_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Symbol(s) | NodeKind::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Head symbol of a list, if the list is non-empty and starts with one.
    pub fn head(&self) -> Option<&str> {
        self.as_list()?.first()?.as_symbol()
    }

    // Metadata

    /// Borrow the whole metadata table.
    pub fn metadata(&self) -> Ref<'_, Metadata> {
        self.meta.borrow()
    }

    pub fn meta(&self, key: &str) -> Option<Node> {
        self.meta.borrow().get(key).cloned()
    }

    pub fn has_meta(&self, key: &str) -> bool {
        self.meta.borrow().contains_key(key)
    }

    /// Set a metadata entry in place. Shape is untouched.
    pub fn set_meta(&self, key: impl Into<String>, value: Node) {
        self.meta.borrow_mut().insert(key.into(), value);
    }

    pub fn remove_meta(&self, key: &str) -> Option<Node> {
        self.meta.borrow_mut().remove(key)
    }

    #[must_use]
    pub fn with_meta(self, key: impl Into<String>, value: Node) -> Self {
        self.set_meta(key, value);
        self
    }

    /// Source span recorded by the reader, if any.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "reader positions are small positive integers"
    )]
    pub fn span(&self) -> Option<Span> {
        let meta = self.meta.borrow();
        let get = |key: &str| meta.get(key).and_then(Node::as_int).map(|v| v as u32);
        let start = Position::new(get("line")?, get("col")?);
        let end = match (get("end-line"), get("end-col")) {
            (Some(line), Some(col)) => Position::new(line, col),
            _ => start,
        };
        Some(Span::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_is_ignored_by_equality() {
        let a = Node::symbol("x").with_meta("line", Node::int(3));
        let b = Node::symbol("x");
        assert_eq!(a, b);
    }

    #[test]
    fn set_meta_through_shared_reference() {
        let n = Node::list(vec![Node::symbol("f")]);
        let shared = &n;
        shared.set_meta("seen", Node::boolean(true));
        assert_eq!(n.meta("seen"), Some(Node::boolean(true)));
    }

    #[test]
    fn rebuild_keeps_metadata() {
        let n = Node::vector(vec![]).with_meta("line", Node::int(1));
        let m = n.rebuild(NodeKind::Vector(vec![Node::int(1)]));
        assert_eq!(m.meta("line"), Some(Node::int(1)));
        assert_eq!(m.as_vector().map(<[Node]>::len), Some(1));
    }

    #[test]
    fn head_of_list() {
        let n = Node::list(vec![Node::symbol("add"), Node::int(1)]);
        assert_eq!(n.head(), Some("add"));
        assert_eq!(Node::list(vec![Node::int(1)]).head(), None);
        assert_eq!(Node::list(vec![]).head(), None);
    }

    #[test]
    fn span_from_reader_metadata() {
        let n = Node::nil()
            .with_meta("line", Node::int(2))
            .with_meta("col", Node::int(5))
            .with_meta("end-line", Node::int(2))
            .with_meta("end-col", Node::int(9));
        let span = n.span();
        assert_eq!(
            span,
            Some(Span::new(Position::new(2, 5), Position::new(2, 9)))
        );
    }
}
