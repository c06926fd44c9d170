//! Handler registration and dispatch
//!
//! A handler turns one token into a tree node. Handlers are registered
//! per token kind; registration wraps the handler so its return value is
//! normalized: an already-built `Node` passes through, a structural
//! `NodeSpec` is coerced into a node, and `Nothing` consumes the token
//! without producing one. Nodes coerced from specs without a kind are
//! stamped with the registration kind. After coercion the wrapper emits
//! the `handled` event plus a kind-named event.
//!
//! The table is shared between engines created with `Parser::create`;
//! the shared map is treated as immutable configuration once parsing
//! begins, so cloning the `Rc` handles is all the sharing needed.

use std::collections::HashMap;
use std::rc::Rc;

use crate::errors::ParseError;
use crate::lexer::Token;
use crate::node::{Node, NodeSpec};
use crate::parser::Parser;

// ============================================================================
// EMIT - the closed set of handler return shapes
// ============================================================================

/// What a handler may produce for one token.
pub enum Emit {
    /// An already-constructed node, used as-is.
    Node(Node),
    /// Plain structural data, coerced into a node.
    Spec(NodeSpec),
    /// Nothing: the token is consumed without producing a node.
    Nothing,
}

impl From<Node> for Emit {
    fn from(node: Node) -> Self {
        Emit::Node(node)
    }
}

impl From<NodeSpec> for Emit {
    fn from(spec: NodeSpec) -> Self {
        Emit::Spec(spec)
    }
}

impl From<Option<Node>> for Emit {
    fn from(node: Option<Node>) -> Self {
        node.map_or(Emit::Nothing, Emit::Node)
    }
}

impl From<&Token> for Emit {
    fn from(token: &Token) -> Self {
        Emit::Spec(token.into())
    }
}

impl From<&Token> for NodeSpec {
    fn from(token: &Token) -> Self {
        NodeSpec {
            kind: token.kind.clone(),
            value: Some(token.value.clone()),
            children: None,
        }
    }
}

/// Coerce a handler result into a node, stamping `fallback_kind` onto a
/// result that lacks one. Pure: no events, no engine state.
pub fn coerce(emit: Emit, fallback_kind: &str) -> Option<Node> {
    let node = match emit {
        Emit::Node(node) => node,
        Emit::Spec(spec) => Node::from_spec(spec),
        Emit::Nothing => return None,
    };
    node.stamp_kind(fallback_kind);
    Some(node)
}

// ============================================================================
// HANDLER TABLE
// ============================================================================

/// A registered handler after wrapping: coercion and event emission are
/// already applied.
pub type Handler = Rc<dyn Fn(&mut Parser, &Token) -> Result<Option<Node>, ParseError>>;

/// The kind for fallback handlers: consulted when no handler is
/// registered for a token's own kind.
pub const DEFAULT_KIND: &str = "default";

#[derive(Clone, Default)]
pub struct HandlerTable {
    handlers: HashMap<String, Handler>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `kind`, wrapping it for coercion and event
    /// emission. Re-registering a kind replaces the prior handler.
    pub fn register<T, F>(&mut self, kind: impl Into<String>, handler: F)
    where
        T: Into<Emit>,
        F: Fn(&mut Parser, &Token) -> Result<T, ParseError> + 'static,
    {
        let kind = kind.into();
        let stamp = kind.clone();
        let wrapped: Handler = Rc::new(move |parser, token| {
            let emit = handler(parser, token)?.into();
            let already_node = matches!(emit, Emit::Node(_));
            let node = coerce(emit, &stamp);
            if let Some(node) = &node {
                if !already_node {
                    parser.emit_node(node);
                }
                parser.emit_handled(node);
            }
            Ok(node)
        });
        self.handlers.insert(kind, wrapped);
    }

    /// Register the no-op handler for `kind`: the token becomes a leaf
    /// node with the token's kind and value.
    pub fn register_noop(&mut self, kind: impl Into<String>) {
        self.register(kind, |_parser, token: &Token| Ok(Emit::from(token)));
    }

    /// The handler for `kind`, falling back to `default`.
    pub fn get(&self, kind: &str) -> Result<Handler, ParseError> {
        self.handlers
            .get(kind)
            .or_else(|| self.handlers.get(DEFAULT_KIND))
            .cloned()
            .ok_or_else(|| ParseError::no_handler(kind))
    }

    /// True when a handler is registered for exactly `kind` (no default
    /// fallback).
    pub fn has(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Registered kinds, unordered.
    pub fn kinds(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }
}
