//! The parse engine
//!
//! `Parser` orchestrates the whole pipeline: pull a token from the
//! lexer, dispatch the registered handler for the token's kind, coerce
//! the result into a node, and classify that node as opening a new
//! block, closing the innermost open block, or a plain append. The
//! engine owns the open-block state, the handler table, the lexer and
//! the event observers; handlers receive the engine itself as context so
//! lookahead-driven grammars can call back into `peek`, `expect`,
//! `accept`, `push` and `is_inside`.
//!
//! Classification is the heart of the engine. For a candidate node `n`
//! under the current block `p`:
//!
//! 1. `n` opens a new block when the configured open predicate (global
//!    override, then a predicate attached to `p`) says so, or by
//!    default when `n` is itself a block whose first child, if any, is
//!    not a close for `n`. Opening wins over closing.
//! 2. `n` is appended to `p` either way; every node lands in the tree
//!    exactly once.
//! 3. `n` closes `p` when the close predicate says so, or by default
//!    when `n.kind` splits on the separator into `p`'s kind followed by
//!    the close marker. Closes are tested against the current top only;
//!    closing an ancestor means closing every intervening block first.

use std::rc::Rc;

use regex::Regex;

use crate::errors::{Category, ParseError, PositionContext};
use crate::events::{Event, Events};
use crate::handlers::{Emit, HandlerTable};
use crate::lexer::{Lexer, Location, Token};
use crate::node::{Node, NodeSpec};
use crate::state::State;

/// Global classification strategy `(candidate, current block)`,
/// overriding both the per-node predicates and the default rules.
pub type ScopePredicate = dyn Fn(&Node, &Node) -> bool;

// ============================================================================
// OPTIONS
// ============================================================================

/// Engine configuration: the reserved root kind, the type-tag separator
/// convention, and optional global overrides for the open/close
/// predicates.
#[derive(Clone)]
pub struct Options {
    /// Kind of the distinguished root node.
    pub root_kind: String,
    /// Separator splitting structured kinds like `brace.close`.
    pub separator: char,
    /// Second segment marking a kind as a closer.
    pub close_marker: String,
    /// Global open predicate; overrides the per-node predicates and the
    /// default rule.
    pub is_open: Option<Rc<ScopePredicate>>,
    /// Global close predicate.
    pub is_close: Option<Rc<ScopePredicate>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            root_kind: "root".to_string(),
            separator: '.',
            close_marker: "close".to_string(),
            is_open: None,
            is_close: None,
        }
    }
}

/// Parse lifecycle. A parser is reusable: `parse` re-initializes all
/// state, so `Done` and `Failed` both return to `Running` on the next
/// call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Status {
    #[default]
    Idle,
    Running,
    Done,
    Failed,
}

// ============================================================================
// PARSER
// ============================================================================

pub struct Parser {
    options: Options,
    lexer: Lexer,
    handlers: HandlerTable,
    events: Events,
    state: State,
    ast: Node,
    bos: Node,
    eos: Node,
    status: Status,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self::assemble(options, Lexer::new(), HandlerTable::new())
    }

    /// Build a parser around an existing lexer, keeping its recognizers.
    pub fn with_lexer(lexer: Lexer) -> Self {
        Self::assemble(Options::default(), lexer, HandlerTable::new())
    }

    fn assemble(options: Options, lexer: Lexer, handlers: HandlerTable) -> Self {
        let ast = Node::block(options.root_kind.clone(), vec![]);
        let state = State::new(ast.clone());
        Self {
            options,
            lexer,
            handlers,
            events: Events::new(),
            state,
            ast,
            bos: Node::new("bos", Some(String::new())),
            eos: Node::new("eos", Some(String::new())),
            status: Status::Idle,
        }
    }

    /// Reset all parse state for a fresh input: new root, new stack, new
    /// sentinels. Nothing carries over between parses except the
    /// registered grammar.
    fn init(&mut self, input: String) {
        self.lexer.init(input);
        self.ast = Node::block(self.options.root_kind.clone(), vec![]);
        self.state = State::new(self.ast.clone());
        self.bos = Node::new("bos", Some(String::new()));
        self.eos = Node::new("eos", Some(String::new()));
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a handler for `kind`. Chainable; re-registering replaces.
    pub fn register<T, F>(&mut self, kind: impl Into<String>, handler: F) -> &mut Self
    where
        T: Into<Emit>,
        F: Fn(&mut Parser, &Token) -> Result<T, ParseError> + 'static,
    {
        self.handlers.register(kind, handler);
        self
    }

    /// Register a lexer recognizer and the no-op handler for `kind`: each
    /// matched token becomes a leaf node.
    pub fn capture(&mut self, kind: &str, regex: Regex) -> &mut Self {
        self.lexer.capture(kind, regex);
        self.handlers.register_noop(kind);
        self
    }

    /// Register a lexer recognizer together with a handler for `kind`.
    pub fn capture_with<T, F>(&mut self, kind: &str, regex: Regex, handler: F) -> &mut Self
    where
        T: Into<Emit>,
        F: Fn(&mut Parser, &Token) -> Result<T, ParseError> + 'static,
    {
        self.lexer.capture(kind, regex);
        self.handlers.register(kind, handler);
        self
    }

    /// Register an event listener. Names: `node`, `push`, `pop`,
    /// `handled`, any node kind, `parsed`, `error`.
    pub fn on(&mut self, name: impl Into<String>, listener: impl FnMut(&Event) + 'static) -> &mut Self {
        self.events.on(name, listener);
        self
    }

    // ------------------------------------------------------------------------
    // Handler capability surface
    // ------------------------------------------------------------------------

    /// Construct a node from a kind, a `(kind, value)` pair, a token, or
    /// a full `NodeSpec`; emits the `node` event.
    pub fn node(&self, spec: impl Into<NodeSpec>) -> Node {
        let node = Node::from_spec(spec.into());
        self.emit_node(&node);
        node
    }

    /// Construct an empty block node of `kind`; emits the `node` event.
    pub fn block(&self, kind: &str) -> Node {
        self.node(NodeSpec::block(kind))
    }

    /// True while an open block of `kind` is on the stack.
    pub fn is_inside(&self, kind: &str) -> bool {
        self.state.is_inside(kind)
    }

    /// The innermost open block: the current insertion point.
    pub fn current(&self) -> Node {
        self.state.current()
    }

    /// The most recently completed node: the deepest last child under
    /// the current block.
    pub fn last(&self) -> Node {
        self.state.last_descendant()
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<Token>, ParseError> {
        self.lexer.peek()
    }

    /// Consume the next token and run it through dispatch and
    /// classification; the unit the parse loop is built from.
    pub fn next(&mut self) -> Result<Option<Node>, ParseError> {
        let Some(token) = self.lexer.next()? else {
            return Ok(None);
        };
        let Some(node) = self.dispatch(&token)? else {
            return Ok(None);
        };
        self.push(node).map(Some)
    }

    /// Require the next token to have `kind`: consume and dispatch it,
    /// or fail with a typed mismatch.
    pub fn expect(&mut self, kind: &str) -> Result<Option<Node>, ParseError> {
        match self.lexer.peek()? {
            Some(token) if token.kind == kind => self.next(),
            Some(token) => {
                let err = ParseError::expected_token(kind, &token.kind);
                Err(self.contextualize(err, token.value.chars().count(), token.position))
            }
            None => Err(ParseError::expected_token(kind, "eos")),
        }
    }

    /// Consume and dispatch the next token only when it has `kind`;
    /// otherwise leave it queued and return nothing.
    pub fn accept(&mut self, kind: &str) -> Result<Option<Node>, ParseError> {
        match self.lexer.peek()? {
            Some(token) if token.kind == kind => self.next(),
            _ => Ok(None),
        }
    }

    /// Build a contextualized grammar error for a handler to return,
    /// carrying a snippet of the recently consumed input.
    pub fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::handler(message).with_context(self.lexer.context(0))
    }

    // ------------------------------------------------------------------------
    // Classification
    // ------------------------------------------------------------------------

    /// Hand a node to the open/close classification algorithm: append it
    /// under the current block and update the stack accordingly. Nodes
    /// marked `skip` bypass classification and are appended as-is.
    pub fn push(&mut self, node: Node) -> Result<Node, ParseError> {
        let parent = self.state.current();
        if node.skip() {
            parent.append(node.clone())?;
            return Ok(node);
        }
        let opens = self.opens(&node, &parent);
        parent.append(node.clone())?;

        if opens {
            self.state.push(node.clone());
            self.events.emit("push", &Event::Push(node.clone()));
            return Ok(node);
        }

        if self.closes(&node, &parent) {
            let Some(closed) = self.state.pop() else {
                let err = ParseError::unexpected_close(node.kind());
                return Err(self.contextualize_node(err, &node));
            };
            self.events.emit("pop", &Event::Pop(closed));
            return Ok(node);
        }

        if self.closer_shaped(&node) {
            let err = if self.state.depth() <= 1 {
                ParseError::unexpected_close(node.kind())
            } else {
                let expected = format!(
                    "{}{}{}",
                    parent.kind(),
                    self.options.separator,
                    self.options.close_marker
                );
                ParseError::mismatched_close(expected, node.kind())
            };
            return Err(self.contextualize_node(err, &node));
        }

        Ok(node)
    }

    /// Does `node` open a new block under `parent`?
    fn opens(&self, node: &Node, parent: &Node) -> bool {
        if let Some(pred) = self.options.is_open.as_deref() {
            return pred(node, parent);
        }
        if let Some(pred) = parent.open_predicate() {
            return (*pred)(node);
        }
        if !node.is_block() {
            return false;
        }
        match node.first_child() {
            None => true,
            Some(first) => !self.closes(&first, node),
        }
    }

    /// Does `node` close `block`?
    fn closes(&self, node: &Node, block: &Node) -> bool {
        if let Some(pred) = self.options.is_close.as_deref() {
            return pred(node, block);
        }
        if let Some(pred) = block.close_predicate() {
            return (*pred)(node);
        }
        let kind = node.kind();
        let block_kind = block.kind();
        let mut segments = kind.split(self.options.separator);
        segments.next() == Some(block_kind.as_str())
            && segments.next() == Some(self.options.close_marker.as_str())
    }

    /// Does `node` look like a closer for *some* block: second kind
    /// segment equal to the close marker?
    fn closer_shaped(&self, node: &Node) -> bool {
        let kind = node.kind();
        kind.split(self.options.separator).nth(1) == Some(self.options.close_marker.as_str())
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    fn dispatch(&mut self, token: &Token) -> Result<Option<Node>, ParseError> {
        let value_len = token.value.chars().count();
        let position = token.position;
        let handler = self
            .handlers
            .get(&token.kind)
            .map_err(|err| self.contextualize(err, value_len, position))?;
        (*handler)(self, token).map_err(|err| self.contextualize(err, value_len, position))
    }

    fn contextualize(
        &self,
        err: ParseError,
        value_len: usize,
        position: Option<Location>,
    ) -> ParseError {
        let mut context = PositionContext::new(self.lexer.consumed(), value_len);
        if let Some(location) = position {
            context = context.at(location.start.line, location.start.column);
        }
        err.with_context(context)
    }

    fn contextualize_node(&self, err: ParseError, node: &Node) -> ParseError {
        let value_len = node.value().map_or(0, |v| v.chars().count());
        err.with_context(PositionContext::new(self.lexer.consumed(), value_len))
    }

    pub(crate) fn emit_node(&self, node: &Node) {
        self.events.emit("node", &Event::Node(node.clone()));
    }

    pub(crate) fn emit_handled(&self, node: &Node) {
        self.events.emit("handled", &Event::Handled(node.clone()));
        self.events.emit(&node.kind(), &Event::Kind(node.clone()));
    }

    // ------------------------------------------------------------------------
    // The parse loop
    // ------------------------------------------------------------------------

    /// Parse `input` into a tree. Fails up front with `no_handlers` when
    /// no grammar was ever registered; fails with `invalid_input` when
    /// re-entered from inside a running parse. All state is fresh per
    /// call.
    pub fn parse(&mut self, input: impl Into<String>) -> Result<Node, ParseError> {
        if self.status == Status::Running {
            return Err(ParseError::invalid_input());
        }
        if self.handlers.is_empty() {
            return Err(ParseError::no_handlers());
        }

        self.init(input.into());
        self.status = Status::Running;
        match self.run() {
            Ok(ast) => {
                self.status = Status::Done;
                self.events.emit("parsed", &Event::Parsed(ast.clone()));
                Ok(ast)
            }
            Err(err) => {
                self.status = Status::Failed;
                Err(err)
            }
        }
    }

    fn run(&mut self) -> Result<Node, ParseError> {
        self.push_sentinel("bos")?;
        while !self.lexer.eos() {
            if let Err(err) = self.next() {
                self.signal(err)?;
            }
        }
        self.push_sentinel("eos")?;

        if self.state.depth() > 1 {
            let unclosed = ParseError::unclosed_block(self.state.current().kind());
            let unclosed = self.contextualize(unclosed, 0, None);
            self.signal(unclosed)?;
        }
        Ok(self.ast.clone())
    }

    /// Append a stream sentinel, dispatching through a handler when one
    /// is registered for exactly the sentinel kind.
    fn push_sentinel(&mut self, kind: &str) -> Result<(), ParseError> {
        let fallback = if kind == "bos" {
            self.bos.clone()
        } else {
            self.eos.clone()
        };
        let node = if self.handlers.has(kind) {
            let token = Token::new(kind, "");
            self.dispatch(&token)?.unwrap_or(fallback)
        } else {
            fallback
        };
        self.push(node)?;
        Ok(())
    }

    /// Route a failure: parser-category errors go to `error` listeners
    /// when any are registered (the parse then continues at the caller's
    /// risk); lexer errors always propagate, since the lexer cannot make
    /// progress past them.
    fn signal(&mut self, err: ParseError) -> Result<(), ParseError> {
        if err.category() == Category::Parser && self.events.has_listeners("error") {
            self.events.emit("error", &Event::Error(err));
            return Ok(());
        }
        Err(err)
    }

    // ------------------------------------------------------------------------
    // Composition
    // ------------------------------------------------------------------------

    /// A fresh parser sharing this one's grammar: same options, same
    /// handler table, same lexer recognizers, fresh everything else.
    /// Used to parse a sub-input without re-registering.
    pub fn create(&self) -> Parser {
        Self::assemble(
            self.options.clone(),
            self.lexer.create(),
            self.handlers.clone(),
        )
    }

    /// Splice another completed parse's children, minus its sentinels,
    /// onto the end of `block`, re-deriving parent and index for each
    /// spliced child.
    pub fn concat(&mut self, block: &Node, other_root: &Node) -> Result<(), ParseError> {
        let spliced = other_root.extract_children(|n| !n.is_kind("bos") && !n.is_kind("eos"));
        for child in spliced {
            self.emit_node(&child);
            block.append(child)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// The root of the current (or most recent) parse.
    pub fn ast(&self) -> Node {
        self.ast.clone()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The full input of the current parse.
    pub fn input(&self) -> &str {
        self.lexer.input()
    }

    /// The part of the input that has been tokenized so far.
    pub fn consumed(&self) -> &str {
        self.lexer.consumed()
    }

    pub fn lexer(&self) -> &Lexer {
        &self.lexer
    }

    /// Direct lexer access, for registering recognizers with
    /// preprocessors or driving tokenization manually.
    pub fn lexer_mut(&mut self) -> &mut Lexer {
        &mut self.lexer
    }

    pub fn handlers(&self) -> &HandlerTable {
        &self.handlers
    }

    /// The open-block state, for introspection and invariant checks.
    pub fn state(&self) -> &State {
        &self.state
    }
}
