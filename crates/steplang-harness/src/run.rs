//! Run management: the per-client replace-on-supersede policy and the
//! host-side pipeline.
//!
//! [`RunManager`] tracks at most one active run per client key. Submitting
//! a run for a key that already has one in flight supersedes it: the old
//! context's cancel flag is raised, its registry slot is replaced, and the
//! host discards (never merges) any late events it still produces. Each
//! submission gets a fresh isolation context; contexts are never reused
//! across runs.
//!
//! [`run_script`] is the whole host-side pipeline in one call: instrument
//! (syntax failures return immediately, nothing executes), run isolated,
//! collect the outcome, and post-process the trace with synthetic `wait`
//! steps.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use steplang_core::RunOutcome;
use steplang_instrument::instrument;

use crate::interpreter::ExecConfig;
use crate::isolate::{
    spawn, HarnessError, IsolationStrategy, RunHandle, RunRequest, WorkerSpec,
};
use crate::trace::{insert_wait_steps, WAIT_GAP_THRESHOLD_MS};

struct ActiveRun {
    id: Uuid,
    cancel: Arc<AtomicBool>,
}

/// Tracks in-flight runs, one per client key.
pub struct RunManager {
    active: DashMap<String, ActiveRun>,
    config: ExecConfig,
    worker: WorkerSpec,
}

impl RunManager {
    pub fn new(config: ExecConfig, worker: WorkerSpec) -> Self {
        RunManager {
            active: DashMap::new(),
            config,
            worker,
        }
    }

    /// Starts a run for `client`, superseding any previous one.
    pub fn submit(
        &self,
        client: &str,
        request: RunRequest,
        strategy: IsolationStrategy,
    ) -> Result<RunHandle, HarnessError> {
        let handle = spawn(request, strategy, self.config, &self.worker)?;
        let previous = self.active.insert(
            client.to_string(),
            ActiveRun {
                id: handle.id(),
                cancel: handle.cancel_flag(),
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(client, superseded = %previous.id, "superseding in-flight run");
            previous.cancel.store(true, Ordering::Relaxed);
        }
        Ok(handle)
    }

    /// Releases the registry slot once a run finished, unless a newer run
    /// already took it over.
    pub fn finish(&self, client: &str, id: Uuid) {
        self.active.remove_if(client, |_, active| active.id == id);
    }

    /// Whether `id` is still the current run for `client`. Hosts use this
    /// to drop late results of superseded runs.
    pub fn is_current(&self, client: &str, id: Uuid) -> bool {
        self.active
            .get(client)
            .map(|active| active.id == id)
            .unwrap_or(false)
    }
}

/// The full host-side pipeline for one script.
///
/// Must run inside a tokio runtime when `strategy` is
/// [`IsolationStrategy::Process`].
pub async fn run_script(
    code: &str,
    strategy: IsolationStrategy,
    config: ExecConfig,
    worker: &WorkerSpec,
) -> RunOutcome {
    let instrumented = match instrument(code) {
        Ok(instrumented) => instrumented,
        Err(err) => return RunOutcome {
            steps: Vec::new(),
            error: Some(err.to_failure()),
        },
    };
    let request = RunRequest::new(code).with_transpiled(instrumented.source);

    let mut outcome = match spawn(request, strategy, config, worker) {
        Ok(handle) => handle.wait().await,
        Err(err) => {
            return RunOutcome {
                steps: Vec::new(),
                error: Some(steplang_core::RunFailure::new("Error", err.to_string())),
            }
        }
    };
    insert_wait_steps(&mut outcome.steps, WAIT_GAP_THRESHOLD_MS);
    outcome
}

/// Blocking variant of [`run_script`] for synchronous callers (CLI). Builds
/// a private single-threaded runtime per call.
pub fn run_script_blocking(
    code: &str,
    strategy: IsolationStrategy,
    config: ExecConfig,
    worker: &WorkerSpec,
) -> std::io::Result<RunOutcome> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(run_script(code, strategy, config, worker)))
}
