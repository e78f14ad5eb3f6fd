//! Parser for template sources

pub mod ast;
mod document;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use document::{parse_template, DocParser, EndTag, TagArgs};
pub use grammar::parse_expression;
pub use lexer::{Token, WhitespaceOptions};
