//! Source-to-source instrumenter.
//!
//! Rewrites a steplang script into an equivalent script that reports every
//! statement and expression execution through the `__step_*` namespace:
//!
//! - a statement `S` becomes
//!   `__step_before__(type, "statement", loc); S'; __step_after__(type, loc);`
//! - an expression `E` becomes
//!   `(__step_before__(type, "expression", loc), __step_value__(type, loc, E'))`
//!
//! `__step_value__` returns its final argument unchanged, so the wrapper is
//! legal anywhere the original expression was. Locations are inlined as
//! literal arguments (1-based line, 0-based column, start then end), making
//! the instrumented text self-contained.
//!
//! The rewrite must never change observable behavior. Sub-expressions that
//! the original would not evaluate stay unevaluated (short-circuit operands
//! are wrapped in place, inside their branch), exceptions propagate after
//! the `before` report and suppress the value report, and the constructs
//! that cannot be wrapped without changing semantics are excluded from
//! reporting entirely (see [`rewrite`] for the list).
//!
//! Instrumentation happens strictly before execution: a script that fails
//! to parse is rejected here with a `SyntaxError`-kind failure and never
//! reaches the harness.

pub mod rewrite;

use steplang_core::RunFailure;
use steplang_syntax::{emit, parse, ParseError};
use thiserror::Error;

/// Name of the injected statement/expression `before` report call.
pub const REPORT_BEFORE: &str = "__step_before__";
/// Name of the injected statement `after` report call.
pub const REPORT_AFTER: &str = "__step_after__";
/// Name of the injected expression value report call.
pub const REPORT_VALUE: &str = "__step_value__";

/// Instrumentation failure: the input could not be parsed.
#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("{0}")]
    Syntax(#[from] ParseError),
}

impl InstrumentError {
    /// The failure in run-result form (`{ type: "SyntaxError", message }`).
    pub fn to_failure(&self) -> RunFailure {
        RunFailure::syntax(self.to_string())
    }
}

/// The result of instrumenting a script.
#[derive(Debug, Clone)]
pub struct Instrumented {
    /// The rewritten, reporting-instrumented source text.
    pub source: String,
}

/// Parses and rewrites a script. Fails only on syntax errors.
pub fn instrument(source: &str) -> Result<Instrumented, InstrumentError> {
    let program = parse(source)?;
    let rewritten = rewrite::rewrite_program(program);
    Ok(Instrumented {
        source: emit(&rewritten),
    })
}
