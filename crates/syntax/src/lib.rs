//! Roole Syntax
//!
//! Node model and parser for the Roole stylesheet language.

mod error;
mod node;
mod parser;
mod selector;
mod value;

pub use error::{SourceLocation, SyntaxError, SyntaxResult};
pub use node::{
    Alternative, ArithmeticOp, AssignOp, EqualityOp, Fragment, LogicalOp, Node, NodeKind, Quote,
    RelationalOp, StringValue, UnaryOp,
};
pub use parser::{parse, parse_media_query, parse_selector, Parser, StartRule};
