//! Lexer, parser, AST, and source emitter for steplang scripts.
//!
//! steplang is a small dynamic scripting language with JS-flavoured syntax:
//! block-scoped `let`, first-class functions with closures, arrays, ordered
//! objects, and the usual control flow. The crate is purely syntactic --
//! evaluation lives in `steplang-harness`, and source-to-source rewriting in
//! `steplang-instrument`.
//!
//! The pipeline is `tokenize -> parse -> (transform) -> emit`:
//!
//! - [`parse`] turns source text into a [`Program`] whose nodes carry source
//!   spans (1-based lines, 0-based columns).
//! - [`emit`] prints a program back to parseable source. Emission is used by
//!   the instrumenter, so `parse(emit(parse(src)))` must be structurally
//!   identical to `parse(src)`.

pub mod ast;
pub mod emit;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{AssignOp, BinaryOp, Expr, ExprKind, LogicalOp, Program, Stmt, StmtKind, UnaryOp};
pub use emit::emit;
pub use error::ParseError;
pub use parser::parse;
