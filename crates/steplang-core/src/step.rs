//! Step records: the unit of a replayable execution trace.
//!
//! Every executed statement and expression in an instrumented script emits
//! one [`StepRecord`] per reporting call. Two synthetic variants exist as
//! well: the `init` step anchoring the start of every trace at `num` 0, and
//! `wait` steps inserted by the trace post-processor where the recorded
//! timeline contains an idle gap.
//!
//! A record is created exactly once by the execution harness and never
//! mutated afterwards, with one exception: the post-processor may insert
//! synthetic records and renumber `num` fields. All other fields are final
//! at emission time.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::span::Span;
use crate::wire::WireValue;

/// Whether a step was emitted before or after its node executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepTime {
    Before,
    After,
}

/// The kind of event a step records.
///
/// `Init` and `Wait` are synthetic: `Init` is always step 0 and carries no
/// execution semantics, `Wait` marks an idle gap synthesized by the
/// post-processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepCategory {
    Statement,
    Expression,
    Wait,
    Init,
}

/// One scope frame: binding name to wire-encoded value, in declaration order.
pub type ScopeFrame = IndexMap<String, WireValue>;

/// One log line: the wire-encoded arguments of a single `log(...)` call.
pub type LogLine = Vec<WireValue>;

/// A single entry in an execution trace.
///
/// Field presence follows the category: `type`/`loc` appear on statement and
/// expression steps, `value` only on `after`/`expression` steps, `wait` only
/// on wait steps, and the `init` step carries nothing but `num`, `category`,
/// and `dt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 0-based step number, equal to the step's index in the trace array.
    pub num: u32,
    /// Before/after marker; absent on synthetic steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<StepTime>,
    /// What kind of event this is.
    pub category: StepCategory,
    /// Syntactic node kind, e.g. `"LetStatement"` or `"BinaryExpression"`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Source span of the node (1-based lines, 0-based columns).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<Span>,
    /// Wire-encoded result value; only on `after` expression steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<WireValue>,
    /// Scope frames visible at the reporting site, innermost first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<ScopeFrame>,
    /// Log lines accumulated since the previous step (at-most-once delivery).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogLine>,
    /// Milliseconds elapsed since run start; non-decreasing across a trace.
    pub dt: u64,
    /// Idle-gap duration in ms; present only on wait steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<u64>,
}

impl StepRecord {
    /// The synthetic step 0 anchoring every trace.
    pub fn init() -> Self {
        StepRecord {
            num: 0,
            time: None,
            category: StepCategory::Init,
            node_type: None,
            loc: None,
            value: None,
            scopes: Vec::new(),
            logs: Vec::new(),
            dt: 0,
            wait: None,
        }
    }

    /// A synthetic wait step representing an idle gap of `gap` ms, stamped
    /// with the `dt` of the step preceding the gap.
    pub fn wait(gap: u64, dt: u64) -> Self {
        StepRecord {
            num: 0,
            time: None,
            category: StepCategory::Wait,
            node_type: None,
            loc: None,
            value: None,
            scopes: Vec::new(),
            logs: Vec::new(),
            dt,
            wait: Some(gap),
        }
    }
}

/// A terminal run failure, surfaced to the host as `{ type, message }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    /// Constructor-style failure kind: `"SyntaxError"`, `"TypeError"`,
    /// `"ReferenceError"`, `"RangeError"`, `"StepLimitExceeded"`, or the
    /// generic `"Error"` when nothing more specific applies.
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable message.
    pub message: String,
}

impl RunFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        RunFailure {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// A pre-execution syntax failure.
    pub fn syntax(message: impl Into<String>) -> Self {
        RunFailure::new("SyntaxError", message)
    }
}

/// The result of one run: a step prefix plus an optional terminal error.
///
/// A successful run has `error: None` and a complete trace; a failed run
/// keeps whatever step prefix was emitted before the failure (possibly just
/// the `init` step, possibly nothing for a syntax failure). Partial traces
/// are preserved, never discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RunOutcome {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

impl RunOutcome {
    /// A run that never started: a syntax failure with no steps.
    pub fn syntax_failure(message: impl Into<String>) -> Self {
        RunOutcome {
            steps: Vec::new(),
            error: Some(RunFailure::syntax(message)),
        }
    }
}
