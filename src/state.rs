//! Parse state - the open-block stack and its per-kind index
//!
//! `State` tracks the linear path of currently-open block nodes from the
//! root down to the innermost open block (the current insertion point),
//! together with a per-kind view of that path for O(1) "am I inside a
//! block of kind K" queries and pop validation.
//!
//! Invariant: for every kind K, the per-kind sub-stack equals the
//! subsequence of the stack whose elements have kind K, in order. The
//! push/pop methods enforce this; a violation is a defect in the engine's
//! classification, never user input, and panics unconditionally.

use std::collections::HashMap;

use crate::node::Node;

#[derive(Default)]
pub struct State {
    stack: Vec<Node>,
    kinds: HashMap<String, Vec<Node>>,
}

impl State {
    pub fn new(root: Node) -> Self {
        let mut state = Self::default();
        state.push(root);
        state
    }

    /// Number of open blocks, the root included.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The innermost open block: the current insertion point.
    pub fn current(&self) -> Node {
        match self.stack.last() {
            Some(node) => node.clone(),
            None => panic!("CorruptStack: state stack is empty"),
        }
    }

    /// True while an open block of `kind` is anywhere on the stack.
    pub fn is_inside(&self, kind: &str) -> bool {
        self.kinds.get(kind).is_some_and(|open| !open.is_empty())
    }

    /// Walk down through the last child repeatedly from the current
    /// block, stopping at a leaf or an empty block: the most recently
    /// completed node, for lookback-driven grammars.
    pub fn last_descendant(&self) -> Node {
        let mut node = self.current();
        while let Some(last) = node.last_child() {
            node = last;
        }
        node
    }

    /// Open a block: push onto the stack and onto its kind's sub-stack.
    ///
    /// # Panics
    ///
    /// Panics on `DuplicatePush` (the same node is already open) and when
    /// the node is not a block; both indicate a classification bug.
    pub fn push(&mut self, node: Node) {
        if !node.is_block() {
            panic!("expected a block node to open, got \"{}\"", node.kind());
        }
        let open = self.kinds.entry(node.kind()).or_default();
        if open.iter().any(|n| n.ptr_eq(&node)) {
            panic!("DuplicatePush: node \"{}\" is already open", node.kind());
        }
        open.push(node.clone());
        self.stack.push(node);
    }

    /// Close the innermost block. Returns `None` when only the root is
    /// left; the root is never popped during normal operation.
    ///
    /// # Panics
    ///
    /// Panics on `CorruptStack`: the node popped from the stack is not
    /// reference-identical to the node popped from its kind's sub-stack.
    pub fn pop(&mut self) -> Option<Node> {
        if self.stack.len() <= 1 {
            return None;
        }
        let node = self.stack.pop()?;
        let kind = node.kind();
        let twin = self.kinds.get_mut(&kind).and_then(Vec::pop);
        match twin {
            Some(twin) if twin.ptr_eq(&node) => Some(node),
            _ => panic!("CorruptStack: kind index for \"{kind}\" disagrees with the stack"),
        }
    }

    /// The stack from root to innermost, for consistency checks.
    pub fn path(&self) -> &[Node] {
        &self.stack
    }

    /// The per-kind sub-stack for `kind`, for consistency checks.
    pub fn open_of_kind(&self, kind: &str) -> Vec<Node> {
        self.kinds.get(kind).cloned().unwrap_or_default()
    }
}
