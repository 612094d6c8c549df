//! Isolation strategies and the host/worker message contract.
//!
//! A run executes off the host's control path in one of two isolation
//! contexts, selected by a caller-supplied [`IsolationStrategy`]:
//!
//! - [`IsolationStrategy::Thread`]: a dedicated worker thread inside the
//!   host process. Cheap, and sufficient when the script only needs the
//!   builtin environment.
//! - [`IsolationStrategy::Process`]: a separate worker process (the
//!   `steplang worker` subcommand) with its own address space, for scripts
//!   that exercise platform facilities the host must not share. The wire
//!   protocol is newline-delimited JSON over stdin/stdout.
//!
//! Both strategies stream [`RunEvent`]s over an async channel and deliver
//! steps in emission (non-decreasing `num`) order. The host never blocks:
//! it awaits the channel. A run is identified by a fresh `Uuid`; its cancel
//! flag is observed cooperatively by the interpreter between steps (thread)
//! or enforced by killing the worker (process).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use steplang_core::step::{LogLine, StepRecord};
use steplang_core::{RunFailure, RunOutcome, WireValue};
use steplang_instrument::instrument;
use steplang_syntax::parse;

use crate::interpreter::{ExecConfig, Interpreter};
use crate::report::ReportSink;

pub mod process;
pub mod thread;

/// Errors starting or driving an isolation context.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The isolation context could not be started.
    #[error("failed to start isolated context: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Which isolation context a run executes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IsolationStrategy {
    #[default]
    Thread,
    Process,
}

/// One run submission.
///
/// `transpiled` carries pre-instrumented source when the host already ran
/// the instrumenter (the normal path: syntax failures are detected before
/// any isolation context exists). A worker receiving only `code`
/// instruments it itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transpiled: Option<String>,
}

impl RunRequest {
    pub fn new(code: impl Into<String>) -> Self {
        RunRequest {
            code: code.into(),
            transpiled: None,
        }
    }

    pub fn with_transpiled(mut self, transpiled: impl Into<String>) -> Self {
        self.transpiled = Some(transpiled.into());
        self
    }
}

/// How to launch the worker process for [`IsolationStrategy::Process`].
#[derive(Debug, Clone)]
pub struct WorkerSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl Default for WorkerSpec {
    /// The current executable's `worker` subcommand -- correct whenever the
    /// host binary exposes one (the CLI does). Servers point this at the
    /// CLI binary instead via configuration.
    fn default() -> Self {
        WorkerSpec {
            program: std::env::current_exe().unwrap_or_else(|_| PathBuf::from("steplang")),
            args: vec!["worker".to_string()],
        }
    }
}

/// Events streamed from an isolation context to the host.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// One step, delivered at emission time.
    Step(StepRecord),
    /// The terminal outcome; nothing follows it.
    Finished(RunOutcome),
}

/// Host-side handle to one in-flight run.
pub struct RunHandle {
    id: Uuid,
    cancel: Arc<AtomicBool>,
    pub events: mpsc::UnboundedReceiver<RunEvent>,
}

impl RunHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The cooperative cancel flag shared with the isolation context.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Raises the cancel flag; the context winds down between steps.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Drains events until the terminal outcome arrives.
    ///
    /// A context that dies without reporting (killed worker, panicked
    /// thread) yields a generic failure with whatever steps were streamed.
    pub async fn wait(mut self) -> RunOutcome {
        let mut streamed = Vec::new();
        loop {
            match self.events.recv().await {
                Some(RunEvent::Step(step)) => streamed.push(step),
                Some(RunEvent::Finished(outcome)) => return outcome,
                None => {
                    return RunOutcome {
                        steps: streamed,
                        error: Some(RunFailure::new(
                            "Error",
                            "isolated context terminated without a result",
                        )),
                    }
                }
            }
        }
    }

    /// Blocking variant of [`RunHandle::wait`] for synchronous callers
    /// (CLI, tests). Must not be called from inside an async context.
    pub fn wait_blocking(mut self) -> RunOutcome {
        let mut streamed = Vec::new();
        loop {
            match self.events.blocking_recv() {
                Some(RunEvent::Step(step)) => streamed.push(step),
                Some(RunEvent::Finished(outcome)) => return outcome,
                None => {
                    return RunOutcome {
                        steps: streamed,
                        error: Some(RunFailure::new(
                            "Error",
                            "isolated context terminated without a result",
                        )),
                    }
                }
            }
        }
    }
}

/// Starts a run under the given isolation strategy.
///
/// For [`IsolationStrategy::Process`] this must be called from within a
/// tokio runtime (the worker is driven by an async task).
pub fn spawn(
    request: RunRequest,
    strategy: IsolationStrategy,
    config: ExecConfig,
    worker: &WorkerSpec,
) -> Result<RunHandle, HarnessError> {
    let (tx, rx) = mpsc::unbounded_channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let id = Uuid::new_v4();

    match strategy {
        IsolationStrategy::Thread => {
            thread::spawn_thread(request, config, Arc::clone(&cancel), tx)?;
        }
        IsolationStrategy::Process => {
            let worker = worker.clone();
            let cancel = Arc::clone(&cancel);
            tokio::spawn(process::drive_worker(request, worker, cancel, tx));
        }
    }

    tracing::debug!(run_id = %id, ?strategy, "isolation context started");
    Ok(RunHandle { id, cancel, events: rx })
}

/// Executes a request inside an isolation context (worker thread or worker
/// process), streaming each step through `on_step`.
///
/// This is the single execution path both strategies share: instrument if
/// the host didn't, parse, run, and fold the result into a [`RunOutcome`]
/// that keeps the already-emitted step prefix on failure.
pub(crate) fn execute_request(
    request: &RunRequest,
    config: ExecConfig,
    cancel: Arc<AtomicBool>,
    on_step: Box<dyn FnMut(&StepRecord) + Send>,
) -> RunOutcome {
    let transpiled = match &request.transpiled {
        Some(transpiled) => transpiled.clone(),
        None => match instrument(&request.code) {
            Ok(instrumented) => instrumented.source,
            Err(err) => {
                return RunOutcome {
                    steps: Vec::new(),
                    error: Some(err.to_failure()),
                }
            }
        },
    };

    let program = match parse(&transpiled) {
        Ok(program) => program,
        // Reachable only if a caller hands over broken transpiled text.
        Err(err) => return RunOutcome::syntax_failure(err.to_string()),
    };

    let mut sink = ReportSink::new(cancel, config.max_steps).with_observer(on_step);
    let result = sink
        .emit_init()
        .and_then(|()| Interpreter::run(&program, &mut sink, config));
    let error = result.err().map(|err| err.to_failure());
    RunOutcome {
        steps: sink.into_steps(),
        error,
    }
}

// ---------------------------------------------------------------------------
// Worker wire protocol
// ---------------------------------------------------------------------------

/// One message on the worker's stdout, one JSON object per line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WorkerMessage {
    /// A step, delivered while the run is in flight.
    Step(StepMessage),
    /// The terminal outcome.
    Done(DoneMessage),
}

/// Per-step worker message.
///
/// `value` and `logs` duplicate the step's own fields for consumers that
/// only watch the latest message. `allSteps` is optional; hosts tolerate it
/// being absent or malformed and treat it as empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMessage {
    pub step: StepRecord,
    #[serde(default)]
    pub value: Option<WireValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogLine>,
    #[serde(
        rename = "allSteps",
        default,
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "lenient_steps"
    )]
    pub all_steps: Vec<StepRecord>,
    #[serde(default)]
    pub updated: bool,
}

/// Terminal worker message: the full outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneMessage {
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// Deserializes `allSteps`, degrading malformed payloads to empty rather
/// than failing the whole message.
fn lenient_steps<'de, D>(deserializer: D) -> Result<Vec<StepRecord>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(raw).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_request_serde_shape() {
        let request = RunRequest::new("let x = 1;").with_transpiled("...");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["code"], "let x = 1;");
        assert_eq!(json["transpiled"], "...");

        let bare: RunRequest = serde_json::from_str(r#"{"code":"let y = 2;"}"#).unwrap();
        assert!(bare.transpiled.is_none());
    }

    #[test]
    fn malformed_all_steps_degrades_to_empty() {
        let json = r#"{"type":"step","step":{"num":0,"category":"init","dt":0},"allSteps":"garbage"}"#;
        let message: WorkerMessage = serde_json::from_str(json).unwrap();
        match message {
            WorkerMessage::Step(step) => {
                assert!(step.all_steps.is_empty());
                assert_eq!(step.step.num, 0);
            }
            other => panic!("expected step message, got {:?}", other),
        }
    }

    #[test]
    fn absent_all_steps_is_empty() {
        let json = r#"{"type":"step","step":{"num":0,"category":"init","dt":0}}"#;
        let message: WorkerMessage = serde_json::from_str(json).unwrap();
        match message {
            WorkerMessage::Step(step) => assert!(step.all_steps.is_empty()),
            other => panic!("expected step message, got {:?}", other),
        }
    }

    #[test]
    fn done_message_flattens_outcome() {
        let done = DoneMessage {
            outcome: RunOutcome {
                steps: vec![StepRecord::init()],
                error: None,
            },
        };
        let json = serde_json::to_value(WorkerMessage::Done(done)).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["steps"][0]["num"], 0);
    }

    #[test]
    fn execute_request_syntax_failure_has_no_steps() {
        let outcome = execute_request(
            &RunRequest::new("let x = ;"),
            ExecConfig::default(),
            Arc::new(AtomicBool::new(false)),
            Box::new(|_| {}),
        );
        assert!(outcome.steps.is_empty());
        assert_eq!(outcome.error.unwrap().kind, "SyntaxError");
    }

    #[test]
    fn execute_request_streams_and_returns_steps() {
        let streamed = Arc::new(std::sync::Mutex::new(0usize));
        let streamed_clone = Arc::clone(&streamed);
        let outcome = execute_request(
            &RunRequest::new("let x = 1 + 2;"),
            ExecConfig::default(),
            Arc::new(AtomicBool::new(false)),
            Box::new(move |_| {
                *streamed_clone.lock().unwrap() += 1;
            }),
        );
        assert!(outcome.error.is_none());
        assert_eq!(*streamed.lock().unwrap(), outcome.steps.len());
        assert!(outcome.steps.len() > 1);
    }
}
