//! Trellis error handling - coded taxonomy for lexer and parser failures
//!
//! Every failure the engine can report is a `ParseError`: a category
//! (lexer or parser), a short machine-readable code, and a message built
//! from the code's template plus contextual arguments. Grammar-level
//! errors are ordinary values propagated with `?`; invariant violations
//! inside the stack bookkeeping are defects and panic instead (see
//! `state.rs`).

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

// ============================================================================
// ERROR KINDS - one variant per code, message templates via thiserror
// ============================================================================

/// All error conditions as a closed enum. Each variant carries the
/// contextual arguments its message template interpolates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    // Lexer errors - tokenization failures
    #[error("recognizer for \"{kind}\" matched an empty string: {pattern}")]
    UnsafeRegex { kind: String, pattern: String },

    #[error("could not find a recognizer to match: \"{remainder}\"")]
    UnmatchedInput { remainder: String },

    // Parser usage errors
    #[error("no handler is registered for token kind \"{kind}\"")]
    NoHandler { kind: String },

    #[error("no parser handlers are registered; handlers must be registered before calling parse")]
    NoHandlers,

    #[error("parse was called while a parse is already in progress")]
    InvalidInput,

    #[error("invalid node: {detail}")]
    InvalidNode { detail: String },

    #[error("expected \"{expected}\", but got \"{found}\"")]
    ExpectedToken { expected: String, found: String },

    // Structural errors - open/close mismatches
    #[error("unexpected closing node \"{found}\" with no open block")]
    UnexpectedClose { found: String },

    #[error("expected \"{expected}\" node, received \"{found}\"")]
    MismatchedClose { expected: String, found: String },

    #[error("unclosed block: \"{kind}\"")]
    UnclosedBlock { kind: String },

    // Failures raised by caller-supplied handler code
    #[error("{message}")]
    Handler { message: String },
}

/// Coarse error category, mirrored in the diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Lexer,
    Parser,
}

impl Category {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lexer => "lexer",
            Self::Parser => "parser",
        }
    }
}

impl ErrorKind {
    /// Get the error category for dispatch and test assertions.
    pub const fn category(&self) -> Category {
        match self {
            Self::UnsafeRegex { .. } | Self::UnmatchedInput { .. } => Category::Lexer,

            Self::NoHandler { .. }
            | Self::NoHandlers
            | Self::InvalidInput
            | Self::InvalidNode { .. }
            | Self::ExpectedToken { .. }
            | Self::UnexpectedClose { .. }
            | Self::MismatchedClose { .. }
            | Self::UnclosedBlock { .. }
            | Self::Handler { .. } => Category::Parser,
        }
    }

    /// Get the error code suffix for diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::UnsafeRegex { .. } => "unsafe_regex",
            Self::UnmatchedInput { .. } => "unmatched_input",
            Self::NoHandler { .. } => "no_handler",
            Self::NoHandlers => "no_handlers",
            Self::InvalidInput => "invalid_input",
            Self::InvalidNode { .. } => "invalid_node",
            Self::ExpectedToken { .. } => "expected_token",
            Self::UnexpectedClose { .. } => "unexpected_close",
            Self::MismatchedClose { .. } => "mismatched_close",
            Self::UnclosedBlock { .. } => "unclosed_block",
            Self::Handler { .. } => "handler_error",
        }
    }
}

// ============================================================================
// POSITION CONTEXT - "show position" snippets for error messages
// ============================================================================

/// Where in the input the failure happened: a trailing snippet of the
/// consumed input with a caret under the offending token, plus line and
/// column when the token carried them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionContext {
    pub snippet: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl PositionContext {
    /// Build a context from the lexer's consumed input and the length of
    /// the value that triggered the failure.
    pub fn new(consumed: &str, value_len: usize) -> Self {
        Self {
            snippet: show_position(consumed, value_len),
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

/// Draw the position where the lexer or parser stopped: the tail of the
/// consumed input with a caret line underneath.
pub fn show_position(consumed: &str, value_len: usize) -> String {
    let mut shown: String = consumed.replace('\n', "\\n");
    let mut len = shown.chars().count();
    if len > 20 {
        shown = shown.chars().skip(len - 20).collect();
        len = 20;
    }

    let idx = len.saturating_sub(value_len);
    let mut caret = String::with_capacity(idx + 1);
    for _ in 0..idx {
        caret.push('-');
    }
    caret.push('^');
    format!("{shown}\n{caret}")
}

// ============================================================================
// THE ERROR TYPE
// ============================================================================

/// The single error type: a coded kind plus optional position context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ErrorKind,
    pub context: Option<PositionContext>,
}

impl ParseError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Attach position context unless some is already present.
    pub fn with_context(mut self, context: PositionContext) -> Self {
        if self.context.is_none() {
            self.context = Some(context);
        }
        self
    }

    pub const fn category(&self) -> Category {
        self.kind.category()
    }

    /// The stable diagnostic code, e.g. `trellis::parser::unclosed_block`.
    pub fn code(&self) -> String {
        format!(
            "trellis::{}::{}",
            self.kind.category().as_str(),
            self.kind.code_suffix()
        )
    }

    // ------------------------------------------------------------------------
    // Constructors, one per code
    // ------------------------------------------------------------------------

    pub fn unsafe_regex(kind: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsafeRegex {
            kind: kind.into(),
            pattern: pattern.into(),
        })
    }

    pub fn unmatched_input(remainder: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnmatchedInput {
            remainder: remainder.into(),
        })
    }

    pub fn no_handler(kind: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoHandler { kind: kind.into() })
    }

    pub fn no_handlers() -> Self {
        Self::new(ErrorKind::NoHandlers)
    }

    pub fn invalid_input() -> Self {
        Self::new(ErrorKind::InvalidInput)
    }

    pub fn invalid_node(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidNode {
            detail: detail.into(),
        })
    }

    pub fn expected_token(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExpectedToken {
            expected: expected.into(),
            found: found.into(),
        })
    }

    pub fn unexpected_close(found: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnexpectedClose {
            found: found.into(),
        })
    }

    pub fn mismatched_close(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::new(ErrorKind::MismatchedClose {
            expected: expected.into(),
            found: found.into(),
        })
    }

    pub fn unclosed_block(kind: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnclosedBlock { kind: kind.into() })
    }

    pub fn handler(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Handler {
            message: message.into(),
        })
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ctx) = &self.context {
            if let (Some(line), Some(column)) = (ctx.line, ctx.column) {
                write!(f, " <line:{line} column:{column}>")?;
            }
            write!(f, "\n{}", ctx.snippet)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl Diagnostic for ParseError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(self.code()))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help: &str = match &self.kind {
            ErrorKind::NoHandlers => {
                "register handlers with Parser::register or Parser::capture before parsing"
            }
            ErrorKind::NoHandler { .. } => {
                "register a handler for this kind, or a \"default\" handler as a fallback"
            }
            ErrorKind::UnmatchedInput { .. } => {
                "register a lexer recognizer that matches this input"
            }
            _ => return None,
        };
        Some(Box::new(help))
    }
}
