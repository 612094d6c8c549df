//! Execution harness: runs instrumented scripts in isolation and streams
//! step events back to the host.
//!
//! # Architecture
//!
//! - [`interpreter`] is a tree-walking evaluator for parsed (usually
//!   instrumented) scripts. The injected `__step_*` calls resolve to
//!   builtins that report into a per-run [`ReportSink`].
//! - [`codec`] is the encode side of the value codec: runtime values to
//!   [`steplang_core::WireValue`], with identity-based cycle detection.
//!   `encode` never fails; hopeless values degrade to string fallbacks.
//! - [`isolate`] runs a script off the host's control path under one of two
//!   strategies: a dedicated worker thread, or a separate worker process
//!   speaking newline-delimited JSON. Both stream [`RunEvent`]s over an
//!   async channel; the host never blocks on a run.
//! - [`run`] owns the per-client replace-on-supersede policy: a new
//!   submission cancels and unregisters the previous in-flight run, whose
//!   late events the host discards.
//! - [`trace`] is the post-processor that inserts synthetic `wait` steps
//!   into gaps in the recorded timeline and renumbers the result.
//!
//! State never leaks between runs: every run gets a fresh root environment,
//! report sink, and step array, owned exclusively for its duration.

pub mod codec;
pub mod interpreter;
pub mod isolate;
pub mod report;
pub mod run;
pub mod trace;
pub mod worker;

pub use interpreter::{ExecConfig, Interpreter, RuntimeError};
pub use isolate::{
    spawn, HarnessError, IsolationStrategy, RunEvent, RunHandle, RunRequest, WorkerSpec,
};
pub use report::ReportSink;
pub use run::{run_script, run_script_blocking, RunManager};
pub use trace::{insert_wait_steps, WAIT_GAP_THRESHOLD_MS};
