//! Lexing of assembly source into a typed token stream (spec.md §4.4).

pub mod token;
pub mod tokenizer;

pub use token::{Radix, SourcePos, Token, TokenKind};
pub use tokenizer::tokenize;
