//! Regex lexer - the tokenizing collaborator the engine pulls from
//!
//! The engine consumes this module through a narrow surface: `next`,
//! `peek`, `eos`, `capture` and `consumed`. Recognizers are tried in
//! registration order and must match at the current position; a
//! recognizer that matches the empty string would stall the token loop
//! and is rejected as `unsafe_regex`. Input no recognizer can classify
//! is `unmatched_input`.

use std::collections::VecDeque;
use std::rc::Rc;

use regex::Regex;

use crate::errors::{ParseError, PositionContext};

/// A line/column/offset coordinate into the input. Lines and columns are
/// 1-based, offsets are byte positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Position {
    pub fn start() -> Self {
        Self {
            line: 1,
            column: 1,
            offset: 0,
        }
    }
}

/// The extent of one token in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub start: Position,
    pub end: Position,
}

/// One lexical token: an opaque kind tag, the matched text, and where it
/// was matched. Kinds mean nothing to the lexer or the engine; they only
/// select handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: String,
    pub value: String,
    pub position: Option<Location>,
}

impl Token {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            position: None,
        }
    }
}

/// Optional token rewrite applied right after a recognizer matches.
pub type Preprocessor = dyn Fn(Token) -> Token;

#[derive(Clone)]
struct Recognizer {
    kind: String,
    regex: Regex,
    preprocess: Option<Rc<Preprocessor>>,
}

// ============================================================================
// LEXER
// ============================================================================

pub struct Lexer {
    input: String,
    position: Position,
    recognizers: Vec<Recognizer>,
    queue: VecDeque<Token>,
}

impl Default for Lexer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexer {
    pub fn new() -> Self {
        Self {
            input: String::new(),
            position: Position::start(),
            recognizers: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    /// Reset to the beginning of a fresh input; recognizers are kept.
    pub fn init(&mut self, input: impl Into<String>) {
        self.input = input.into();
        self.position = Position::start();
        self.queue.clear();
    }

    /// Register a recognizer for `kind`. Recognizers are tried in
    /// registration order and must match at the current position; anchor
    /// patterns with `^`.
    pub fn capture(&mut self, kind: impl Into<String>, regex: Regex) -> &mut Self {
        self.recognizers.push(Recognizer {
            kind: kind.into(),
            regex,
            preprocess: None,
        });
        self
    }

    /// Register a recognizer whose tokens are rewritten by `preprocess`
    /// before the engine sees them.
    pub fn capture_with(
        &mut self,
        kind: impl Into<String>,
        regex: Regex,
        preprocess: impl Fn(Token) -> Token + 'static,
    ) -> &mut Self {
        self.recognizers.push(Recognizer {
            kind: kind.into(),
            regex,
            preprocess: Some(Rc::new(preprocess)),
        });
        self
    }

    pub fn has_recognizers(&self) -> bool {
        !self.recognizers.is_empty()
    }

    /// A fresh lexer sharing this one's recognizers, positioned at the
    /// start of an empty input.
    pub fn create(&self) -> Self {
        Self {
            input: String::new(),
            position: Position::start(),
            recognizers: self.recognizers.clone(),
            queue: VecDeque::new(),
        }
    }

    /// The full input of the current parse.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// The part of the input that has already been tokenized, used for
    /// error-message context.
    pub fn consumed(&self) -> &str {
        &self.input[..self.position.offset]
    }

    /// The untokenized remainder.
    pub fn remainder(&self) -> &str {
        &self.input[self.position.offset..]
    }

    /// True once the input is exhausted and no tokens are queued.
    pub fn eos(&self) -> bool {
        self.queue.is_empty() && self.position.offset >= self.input.len()
    }

    /// Pull the next token, or `None` at end of stream.
    pub fn next(&mut self) -> Result<Option<Token>, ParseError> {
        if let Some(token) = self.queue.pop_front() {
            return Ok(Some(token));
        }
        self.advance()
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<Option<Token>, ParseError> {
        self.lookahead(1)
    }

    /// Look `n` tokens ahead without consuming, queueing as needed.
    pub fn lookahead(&mut self, n: usize) -> Result<Option<Token>, ParseError> {
        while self.queue.len() < n {
            match self.advance()? {
                Some(token) => self.queue.push_back(token),
                None => return Ok(None),
            }
        }
        Ok(self.queue.get(n - 1).cloned())
    }

    /// Match one token at the current position.
    fn advance(&mut self) -> Result<Option<Token>, ParseError> {
        if self.position.offset >= self.input.len() {
            return Ok(None);
        }
        let rest = &self.input[self.position.offset..];
        for recognizer in &self.recognizers {
            let Some(found) = recognizer.regex.find(rest) else {
                continue;
            };
            if found.start() != 0 {
                continue;
            }
            if found.as_str().is_empty() {
                return Err(ParseError::unsafe_regex(
                    &recognizer.kind,
                    recognizer.regex.as_str(),
                ));
            }

            let value = found.as_str().to_string();
            let start = self.position;
            let end = step(start, &value);
            self.position = end;

            let mut token = Token {
                kind: recognizer.kind.clone(),
                value,
                position: Some(Location { start, end }),
            };
            if let Some(preprocess) = &recognizer.preprocess {
                token = preprocess(token);
            }
            return Ok(Some(token));
        }

        let mut shown: String = rest.chars().take(10).collect();
        if shown.len() < rest.len() {
            shown.push('…');
        }
        Err(ParseError::unmatched_input(shown).with_context(self.context(0)))
    }

    /// Position context for an error raised at the current cursor.
    pub fn context(&self, value_len: usize) -> PositionContext {
        PositionContext::new(self.consumed(), value_len)
            .at(self.position.line, self.position.column)
    }
}

/// Advance a position across the given text.
fn step(mut position: Position, text: &str) -> Position {
    for ch in text.chars() {
        position.offset += ch.len_utf8();
        if ch == '\n' {
            position.line += 1;
            position.column = 1;
        } else {
            position.column += 1;
        }
    }
    position
}
