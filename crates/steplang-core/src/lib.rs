pub mod span;
pub mod step;
pub mod wire;

// Re-export commonly used types
pub use span::{Position, Span};
pub use step::{LogLine, RunFailure, RunOutcome, ScopeFrame, StepCategory, StepRecord, StepTime};
pub use wire::{decode, DisplayValue, WireValue};
