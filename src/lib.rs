pub use crate::errors::{Category, ErrorKind, ParseError, PositionContext};
pub use crate::events::Event;
pub use crate::handlers::{coerce, Emit, HandlerTable};
pub use crate::lexer::{Lexer, Location, Position, Token};
pub use crate::node::{Node, NodeSpec};
pub use crate::parser::{Options, Parser, ScopePredicate, Status};

pub mod errors;
pub mod events;
pub mod handlers;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod prelude;
pub mod state;
