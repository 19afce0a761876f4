//! Syntactic analysis: tokens to AST

pub mod ast;
pub mod grammar;

pub use ast::{Expr, Program};
pub use grammar::{parse_expression, parse_program, Parser};
