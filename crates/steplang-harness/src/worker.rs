//! The stdio worker loop behind `steplang worker`.
//!
//! Counterpart of [`crate::isolate::process`]: reads one JSON run request
//! from stdin, executes it, writes one [`WorkerMessage::Step`] line per
//! emitted step, and finishes with a single [`WorkerMessage::Done`] line
//! carrying the full outcome. Everything on stdout is protocol; anything
//! diagnostic goes to stderr.

use std::io::{BufRead, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::interpreter::ExecConfig;
use crate::isolate::{execute_request, DoneMessage, RunRequest, StepMessage, WorkerMessage};

/// Runs the worker loop against real stdio. Returns the process exit code.
pub fn worker_main() -> i32 {
    let stdin = std::io::stdin();
    let mut line = String::new();
    if let Err(err) = stdin.lock().read_line(&mut line) {
        eprintln!("worker: failed to read run request: {}", err);
        return 3;
    }

    let request: RunRequest = match serde_json::from_str(line.trim()) {
        Ok(request) => request,
        Err(err) => {
            eprintln!("worker: malformed run request: {}", err);
            return 3;
        }
    };

    let outcome = execute_request(
        &request,
        ExecConfig::default(),
        Arc::new(AtomicBool::new(false)),
        Box::new(|step| {
            let message = WorkerMessage::Step(StepMessage {
                step: step.clone(),
                value: step.value.clone(),
                logs: step.logs.clone(),
                all_steps: Vec::new(),
                updated: true,
            });
            emit_line(&message);
        }),
    );

    emit_line(&WorkerMessage::Done(DoneMessage { outcome }));
    0
}

/// Writes one protocol line, flushing so the host sees it immediately.
fn emit_line(message: &WorkerMessage) {
    match serde_json::to_string(message) {
        Ok(json) => {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(json.as_bytes());
            let _ = stdout.write_all(b"\n");
            let _ = stdout.flush();
        }
        Err(err) => eprintln!("worker: failed to encode message: {}", err),
    }
}
