//! Worker-process isolation.
//!
//! Spawns the worker binary (see [`crate::worker`]) with piped stdio,
//! writes the run request as one JSON line, and relays the worker's
//! line-delimited messages as [`RunEvent`]s. The host side is fully
//! tolerant of a misbehaving worker: unparseable lines are skipped, a
//! missing terminal message becomes a generic failure carrying the steps
//! streamed so far, and cancellation kills the child outright (its address
//! space is the isolation boundary; nothing of the host needs unwinding).

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc::UnboundedSender;

use steplang_core::{RunFailure, RunOutcome};

use super::{RunEvent, RunRequest, WorkerMessage, WorkerSpec};

/// How often the driver checks the cancel flag while the worker runs.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Drives one worker process to completion, forwarding its events.
pub(crate) async fn drive_worker(
    request: RunRequest,
    worker: WorkerSpec,
    cancel: Arc<AtomicBool>,
    tx: UnboundedSender<RunEvent>,
) {
    let outcome = run_worker(&request, &worker, &cancel, &tx).await;
    let _ = tx.send(RunEvent::Finished(outcome));
}

async fn run_worker(
    request: &RunRequest,
    worker: &WorkerSpec,
    cancel: &Arc<AtomicBool>,
    tx: &UnboundedSender<RunEvent>,
) -> RunOutcome {
    let mut child = match Command::new(&worker.program)
        .args(&worker.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            return failure(format!(
                "failed to spawn worker '{}': {}",
                worker.program.display(),
                err
            ))
        }
    };

    // Hand the request over and close stdin so the worker sees EOF.
    let request_line = match serde_json::to_string(request) {
        Ok(line) => line,
        Err(err) => return failure(format!("failed to encode run request: {}", err)),
    };
    if let Some(mut stdin) = child.stdin.take() {
        let write = async {
            stdin.write_all(request_line.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.shutdown().await
        };
        if let Err(err) = write.await {
            let _ = child.kill().await;
            return failure(format!("failed to write run request: {}", err));
        }
    }

    let stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            let _ = child.kill().await;
            return failure("worker has no stdout".to_string());
        }
    };
    let mut lines = BufReader::new(stdout).lines();
    let mut poll = tokio::time::interval(CANCEL_POLL_INTERVAL);
    let mut streamed = Vec::new();

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => match serde_json::from_str::<WorkerMessage>(&line) {
                    Ok(WorkerMessage::Step(message)) => {
                        streamed.push(message.step.clone());
                        let _ = tx.send(RunEvent::Step(message.step));
                    }
                    Ok(WorkerMessage::Done(done)) => {
                        let _ = child.wait().await;
                        return done.outcome;
                    }
                    // Tolerate garbage on the stream (worker diagnostics,
                    // partial writes); the protocol is line-oriented JSON.
                    Err(err) => {
                        tracing::debug!(error = %err, "skipping malformed worker line");
                    }
                },
                Ok(None) => {
                    let _ = child.wait().await;
                    return RunOutcome {
                        steps: streamed,
                        error: Some(RunFailure::new(
                            "Error",
                            "worker exited without reporting a result",
                        )),
                    };
                }
                Err(err) => {
                    let _ = child.kill().await;
                    return RunOutcome {
                        steps: streamed,
                        error: Some(RunFailure::new(
                            "Error",
                            format!("failed reading from worker: {}", err),
                        )),
                    };
                }
            },
            _ = poll.tick() => {
                if cancel.load(Ordering::Relaxed) {
                    let _ = child.kill().await;
                    return RunOutcome {
                        steps: streamed,
                        error: Some(RunFailure::new("Cancelled", "run cancelled")),
                    };
                }
            }
        }
    }
}

fn failure(message: String) -> RunOutcome {
    RunOutcome {
        steps: Vec::new(),
        error: Some(RunFailure::new("Error", message)),
    }
}
