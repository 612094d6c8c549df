//! Worker-thread isolation.
//!
//! The interpreter runs on a dedicated OS thread with nothing shared with
//! the host beyond the cancel flag and the event channel. Steps stream out
//! as they are emitted; the terminal outcome follows as the last event.
//! Send failures are ignored on purpose: a dropped receiver means the run
//! was superseded and the host no longer wants the results.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use super::{execute_request, HarnessError, RunEvent, RunRequest};
use crate::interpreter::ExecConfig;

/// Spawns the worker thread for one run.
pub(crate) fn spawn_thread(
    request: RunRequest,
    config: ExecConfig,
    cancel: Arc<AtomicBool>,
    tx: UnboundedSender<RunEvent>,
) -> Result<(), HarnessError> {
    std::thread::Builder::new()
        .name("steplang-run".to_string())
        .spawn(move || {
            let step_tx = tx.clone();
            let outcome = execute_request(
                &request,
                config,
                cancel,
                Box::new(move |step| {
                    let _ = step_tx.send(RunEvent::Step(step.clone()));
                }),
            );
            let _ = tx.send(RunEvent::Finished(outcome));
        })?;
    Ok(())
}
