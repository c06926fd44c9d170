//! Commonly used types, for glob import in grammar definitions and tests.

pub use crate::errors::{Category, ErrorKind, ParseError};
pub use crate::events::Event;
pub use crate::handlers::Emit;
pub use crate::lexer::{Lexer, Token};
pub use crate::node::{Node, NodeSpec};
pub use crate::parser::{Options, Parser, Status};
