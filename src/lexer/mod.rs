//! Lexical analysis: source text to spanned tokens

pub mod scanner;
pub mod tokens;

pub use scanner::{tokenize, Lexer};
pub use tokens::{Token, TokenKind};
