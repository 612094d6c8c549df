//! Runtime error types.
//!
//! Every variant maps to a constructor-style `kind` string that becomes the
//! run failure's `type` field. Values thrown by script `throw` statements
//! are folded into [`RuntimeError::Thrown`] at throw time (the message is
//! extracted immediately, so the error type stays `Send`).

use steplang_core::RunFailure;
use thiserror::Error;

/// Errors that halt script execution.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// Operating on a value of the wrong type (calling a number, adding a
    /// function, reading a property of null, ...).
    #[error("{message}")]
    Type { message: String },

    /// Reading or assigning an unbound or not-yet-initialized name.
    #[error("{message}")]
    Reference { message: String },

    /// Out-of-range operations, including call-depth exhaustion.
    #[error("{message}")]
    Range { message: String },

    /// A script-level `throw`.
    #[error("{message}")]
    Thrown { kind: String, message: String },

    /// The per-run step ceiling was hit (runaway loop protection).
    #[error("step limit of {limit} exceeded")]
    StepLimit { limit: u64 },

    /// The run was superseded and cancelled cooperatively.
    #[error("run cancelled")]
    Cancelled,
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::Type {
            message: message.into(),
        }
    }

    pub fn reference(message: impl Into<String>) -> Self {
        RuntimeError::Reference {
            message: message.into(),
        }
    }

    pub fn range(message: impl Into<String>) -> Self {
        RuntimeError::Range {
            message: message.into(),
        }
    }

    /// The constructor-style kind surfaced as the failure `type`.
    pub fn kind(&self) -> &str {
        match self {
            RuntimeError::Type { .. } => "TypeError",
            RuntimeError::Reference { .. } => "ReferenceError",
            RuntimeError::Range { .. } => "RangeError",
            RuntimeError::Thrown { kind, .. } => kind,
            RuntimeError::StepLimit { .. } => "StepLimitExceeded",
            RuntimeError::Cancelled => "Cancelled",
        }
    }

    /// The error in run-result form.
    pub fn to_failure(&self) -> RunFailure {
        RunFailure::new(self.kind(), self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_constructor_names() {
        assert_eq!(RuntimeError::type_error("x").kind(), "TypeError");
        assert_eq!(RuntimeError::reference("x").kind(), "ReferenceError");
        assert_eq!(RuntimeError::range("x").kind(), "RangeError");
        assert_eq!(RuntimeError::StepLimit { limit: 10 }.kind(), "StepLimitExceeded");
    }

    #[test]
    fn thrown_failure_carries_message() {
        let err = RuntimeError::Thrown {
            kind: "Error".into(),
            message: "boom".into(),
        };
        let failure = err.to_failure();
        assert_eq!(failure.kind, "Error");
        assert_eq!(failure.message, "boom");
    }
}
