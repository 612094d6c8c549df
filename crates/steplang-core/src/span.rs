//! Source positions and spans.
//!
//! Positions use 1-based lines and 0-based columns at the source level;
//! consumers (editors, highlighters) convert as needed. Spans are attached to
//! every syntax node and travel with step records so the viewer can map a
//! step back to the text that produced it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single point in source text. Lines start at 1, columns at 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    /// Creates a position. `line` is 1-based, `column` is 0-based.
    pub fn new(line: u32, column: u32) -> Self {
        Position { line, column }
    }

    /// The first position of any source text.
    pub fn origin() -> Self {
        Position { line: 1, column: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open region of source text, from `start` up to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Span { start, end }
    }

    /// A span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
