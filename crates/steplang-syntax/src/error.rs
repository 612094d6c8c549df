//! Syntax error type shared by the lexer and parser.

use steplang_core::Position;
use thiserror::Error;

/// A lexing or parsing failure, with the position it occurred at.
///
/// Parse errors surface to the host as `SyntaxError` run failures; detecting
/// them happens strictly before any execution is attempted.
#[derive(Debug, Clone, Error)]
#[error("{message} at {position}")]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

impl ParseError {
    pub fn new(message: impl Into<String>, position: Position) -> Self {
        ParseError {
            message: message.into(),
            position,
        }
    }
}
