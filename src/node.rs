//! Tree nodes for the Trellis engine
//!
//! A `Node` is a shared handle to a tagged tree record: a string kind, an
//! optional scalar value, and an optional ordered child list. The presence
//! of a child list, even an empty one, marks the node as a *block*; blocks
//! stay blocks for their lifetime. An open block is reachable both from
//! the tree and from the parse state's stack, which is why nodes are
//! `Rc<RefCell<_>>` handles; the parent edge is weak so the tree remains a
//! single-ownership hierarchy released in bulk with the parse result.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::errors::ParseError;

/// Classification strategy attached to a single node. Receives the
/// candidate node being classified against this one.
pub type NodePredicate = dyn Fn(&Node) -> bool;

// ============================================================================
// NODE SPEC - the plain structural record
// ============================================================================

/// The structural projection of a node: what handlers may return instead
/// of an already-built `Node`, and the serde shape of a tree. A spec with
/// an empty kind picks up the registration kind during coercion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    #[serde(default)]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<NodeSpec>>,
}

impl NodeSpec {
    pub fn leaf(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: Some(value.into()),
            children: None,
        }
    }

    /// A block spec with an empty child list.
    pub fn block(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: None,
            children: Some(Vec::new()),
        }
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.get_or_insert_with(Vec::new).push(child);
        self
    }
}

impl From<&str> for NodeSpec {
    fn from(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            value: None,
            children: None,
        }
    }
}

impl From<(&str, &str)> for NodeSpec {
    fn from((kind, value): (&str, &str)) -> Self {
        Self::leaf(kind, value)
    }
}

// ============================================================================
// NODE - the shared tree handle
// ============================================================================

struct NodeInner {
    kind: String,
    value: Option<String>,
    children: Option<Vec<Node>>,
    parent: Weak<RefCell<NodeInner>>,
    index: usize,
    skip: bool,
    is_open: Option<Rc<NodePredicate>>,
    is_close: Option<Rc<NodePredicate>>,
}

/// A shared handle to one tree node. Cloning the handle clones the
/// reference, not the node; identity is `ptr_eq`.
#[derive(Clone)]
pub struct Node {
    inner: Rc<RefCell<NodeInner>>,
}

impl Node {
    /// Build a leaf node.
    pub fn new(kind: impl Into<String>, value: Option<String>) -> Self {
        Self::build(kind.into(), value, None)
    }

    /// Build a block node with the given children, normalizing each
    /// child's parent and index to reflect membership.
    pub fn block(kind: impl Into<String>, children: Vec<Node>) -> Self {
        Self::build(kind.into(), None, Some(children))
    }

    fn build(kind: String, value: Option<String>, children: Option<Vec<Node>>) -> Self {
        let node = Self {
            inner: Rc::new(RefCell::new(NodeInner {
                kind,
                value,
                children: None,
                parent: Weak::new(),
                index: 0,
                skip: false,
                is_open: None,
                is_close: None,
            })),
        };
        if let Some(children) = children {
            node.inner.borrow_mut().children = Some(Vec::with_capacity(children.len()));
            for child in children {
                // children were supplied at construction; the target list
                // is known to be present
                let _ = node.append(child);
            }
        }
        node
    }

    /// Build a node tree from its structural projection.
    pub fn from_spec(spec: NodeSpec) -> Self {
        let children = spec
            .children
            .map(|specs| specs.into_iter().map(Node::from_spec).collect());
        Self::build(spec.kind, spec.value, children)
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn kind(&self) -> String {
        self.inner.borrow().kind.clone()
    }

    pub fn is_kind(&self, kind: &str) -> bool {
        self.inner.borrow().kind == kind
    }

    pub fn value(&self) -> Option<String> {
        self.inner.borrow().value.clone()
    }

    /// True iff a child list is present, regardless of length.
    pub fn is_block(&self) -> bool {
        self.inner.borrow().children.is_some()
    }

    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .children
            .as_ref()
            .map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the child handles, in order.
    pub fn children(&self) -> Vec<Node> {
        self.inner
            .borrow()
            .children
            .as_ref()
            .cloned()
            .unwrap_or_default()
    }

    pub fn child(&self, index: usize) -> Option<Node> {
        self.inner
            .borrow()
            .children
            .as_ref()
            .and_then(|c| c.get(index).cloned())
    }

    pub fn first_child(&self) -> Option<Node> {
        self.child(0)
    }

    pub fn last_child(&self) -> Option<Node> {
        let inner = self.inner.borrow();
        inner.children.as_ref().and_then(|c| c.last().cloned())
    }

    pub fn parent(&self) -> Option<Node> {
        self.inner
            .borrow()
            .parent
            .upgrade()
            .map(|inner| Node { inner })
    }

    /// Position of this node within its parent's child list.
    pub fn index(&self) -> usize {
        self.inner.borrow().index
    }

    pub fn prev_sibling(&self) -> Option<Node> {
        let index = self.index();
        if index == 0 {
            return None;
        }
        self.parent().and_then(|p| p.child(index - 1))
    }

    pub fn next_sibling(&self) -> Option<Node> {
        self.parent().and_then(|p| p.child(self.index() + 1))
    }

    /// Reference identity: two handles to the same node.
    pub fn ptr_eq(&self, other: &Node) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    // ------------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------------

    /// Append `child` to this block's children, setting the child's
    /// parent and index. Fails when this node is not a block.
    pub fn append(&self, child: Node) -> Result<(), ParseError> {
        if !self.is_block() {
            return Err(ParseError::invalid_node(format!(
                "cannot append to non-block node \"{}\"",
                self.kind()
            )));
        }
        {
            let mut child_inner = child.inner.borrow_mut();
            child_inner.parent = Rc::downgrade(&self.inner);
            child_inner.index = self.len();
        }
        let mut inner = self.inner.borrow_mut();
        if let Some(children) = inner.children.as_mut() {
            children.push(child);
        }
        Ok(())
    }

    /// Remove and return every child the predicate selects, reindexing
    /// the children that remain. Used to splice one tree into another.
    pub fn extract_children(&self, select: impl Fn(&Node) -> bool) -> Vec<Node> {
        let mut inner = self.inner.borrow_mut();
        let Some(children) = inner.children.as_mut() else {
            return Vec::new();
        };
        let mut taken = Vec::new();
        let mut kept = Vec::new();
        for child in children.drain(..) {
            if select(&child) {
                child.inner.borrow_mut().parent = Weak::new();
                taken.push(child);
            } else {
                child.inner.borrow_mut().index = kept.len();
                kept.push(child);
            }
        }
        *children = kept;
        taken
    }

    /// Stamp a kind onto a node created without one. Kinds are otherwise
    /// immutable after creation.
    pub(crate) fn stamp_kind(&self, kind: &str) {
        let mut inner = self.inner.borrow_mut();
        if inner.kind.is_empty() {
            inner.kind = kind.to_string();
        }
    }

    // ------------------------------------------------------------------------
    // Classification strategies
    // ------------------------------------------------------------------------

    /// Exempt this node from open/close classification: it is appended
    /// into the tree as-is. For handlers that assemble a complete block
    /// themselves (a sub-parse splice, say) and must not reopen it.
    pub fn set_skip(&self, skip: bool) {
        self.inner.borrow_mut().skip = skip;
    }

    pub fn skip(&self) -> bool {
        self.inner.borrow().skip
    }

    /// Attach an open predicate consulted when this node is the current
    /// block and a candidate is classified against it.
    pub fn set_open_predicate(&self, predicate: impl Fn(&Node) -> bool + 'static) {
        self.inner.borrow_mut().is_open = Some(Rc::new(predicate));
    }

    /// Attach a close predicate deciding which nodes close this block.
    pub fn set_close_predicate(&self, predicate: impl Fn(&Node) -> bool + 'static) {
        self.inner.borrow_mut().is_close = Some(Rc::new(predicate));
    }

    pub(crate) fn open_predicate(&self) -> Option<Rc<NodePredicate>> {
        self.inner.borrow().is_open.clone()
    }

    pub(crate) fn close_predicate(&self) -> Option<Rc<NodePredicate>> {
        self.inner.borrow().is_close.clone()
    }

    // ------------------------------------------------------------------------
    // Projection
    // ------------------------------------------------------------------------

    /// The structural projection of this subtree; parent and index are
    /// derived and never part of the projection.
    pub fn to_spec(&self) -> NodeSpec {
        let inner = self.inner.borrow();
        NodeSpec {
            kind: inner.kind.clone(),
            value: inner.value.clone(),
            children: inner
                .children
                .as_ref()
                .map(|c| c.iter().map(Node::to_spec).collect()),
        }
    }
}

impl From<NodeSpec> for Node {
    fn from(spec: NodeSpec) -> Self {
        Node::from_spec(spec)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        let mut s = f.debug_struct("Node");
        s.field("kind", &inner.kind);
        if let Some(value) = &inner.value {
            s.field("value", value);
        }
        if let Some(children) = &inner.children {
            s.field("children", children);
        }
        s.finish()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let inner = self.inner.borrow();
        let mut fields = 1;
        if inner.value.is_some() {
            fields += 1;
        }
        if inner.children.is_some() {
            fields += 1;
        }
        let mut state = serializer.serialize_struct("Node", fields)?;
        state.serialize_field("kind", &inner.kind)?;
        if let Some(value) = &inner.value {
            state.serialize_field("value", value)?;
        }
        if let Some(children) = &inner.children {
            state.serialize_field("children", children)?;
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_are_not_blocks() {
        let node = Node::new("text", Some("a,b".into()));
        assert!(!node.is_block());
        assert_eq!(node.kind(), "text");
        assert_eq!(node.value(), Some("a,b".into()));
    }

    #[test]
    fn empty_blocks_are_blocks() {
        let node = Node::block("brace", vec![]);
        assert!(node.is_block());
        assert!(node.is_empty());
    }

    #[test]
    fn append_sets_parent_and_index() {
        let block = Node::block("brace", vec![]);
        let open = Node::new("brace.open", Some("{".into()));
        let text = Node::new("text", Some("a".into()));
        block.append(open.clone()).unwrap();
        block.append(text.clone()).unwrap();

        assert_eq!(open.index(), 0);
        assert_eq!(text.index(), 1);
        assert!(text.parent().unwrap().ptr_eq(&block));
        assert!(open.next_sibling().unwrap().ptr_eq(&text));
        assert!(text.prev_sibling().unwrap().ptr_eq(&open));
    }

    #[test]
    fn append_to_leaf_fails() {
        let leaf = Node::new("text", None);
        let err = leaf.append(Node::new("x", None)).unwrap_err();
        assert_eq!(err.code(), "trellis::parser::invalid_node");
    }

    #[test]
    fn from_spec_builds_nested_trees() {
        let spec = NodeSpec::block("brace")
            .with_child(NodeSpec::leaf("brace.open", "{"))
            .with_child(NodeSpec::leaf("brace.close", "}"));
        let node = Node::from_spec(spec.clone());
        assert!(node.is_block());
        assert_eq!(node.len(), 2);
        assert_eq!(node.first_child().unwrap().kind(), "brace.open");
        assert_eq!(node.to_spec(), spec);
    }

    #[test]
    fn serializes_structural_projection() {
        let node = Node::block("brace", vec![Node::new("brace.open", Some("{".into()))]);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "kind": "brace",
                "children": [{"kind": "brace.open", "value": "{"}]
            })
        );
    }

    #[test]
    fn specs_deserialize_into_buildable_trees() {
        let spec: NodeSpec = serde_json::from_str(
            r#"{"kind": "brace", "children": [{"kind": "brace.open", "value": "{"}]}"#,
        )
        .unwrap();
        let node = Node::from_spec(spec);
        assert!(node.is_block());
        assert_eq!(node.first_child().unwrap().value(), Some("{".into()));
    }

    #[test]
    fn extract_children_reindexes_the_rest() {
        let root = Node::block("root", vec![]);
        for kind in ["bos", "a", "b", "eos"] {
            root.append(Node::new(kind, None)).unwrap();
        }
        let taken = root.extract_children(|n| !n.is_kind("bos") && !n.is_kind("eos"));
        assert_eq!(taken.len(), 2);
        assert_eq!(root.len(), 2);
        assert_eq!(root.child(1).unwrap().kind(), "eos");
        assert_eq!(root.child(1).unwrap().index(), 1);
    }
}
