//! Run submission: the host side of the tracing pipeline.
//!
//! One request runs one script: instrument on the host (syntax failures
//! return immediately, before any isolation context exists), execute
//! isolated, post-process the trace, and respond with the step array
//! JSON-encoded as a string (the viewer decodes it together with the wire
//! values inside).
//!
//! Two cross-request behaviors live here:
//!
//! - **Response cache**: finished responses are cached under the blake3
//!   hash of the source; resubmitting identical code replays the cached
//!   outcome without a new run.
//! - **Replace-on-supersede**: submitting with the same `client` while a
//!   run is still in flight cancels the old run. The superseded request
//!   answers with a `Cancelled` error and its partial results are
//!   discarded, never cached or merged.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use steplang_core::RunFailure;
use steplang_harness::{insert_wait_steps, IsolationStrategy, RunRequest, WAIT_GAP_THRESHOLD_MS};
use steplang_instrument::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Body of `POST /api/run`.
#[derive(Debug, Deserialize)]
pub struct RunBody {
    pub code: String,
    /// Stable client key for supersede semantics; one is generated per
    /// request when absent (no supersede coupling between callers).
    #[serde(default)]
    pub client: Option<String>,
    /// Per-request isolation strategy override.
    #[serde(default)]
    pub strategy: Option<IsolationStrategy>,
}

/// Response of `POST /api/run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    pub code: String,
    /// JSON-encoded step array (absent when no steps were produced).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RunFailure>,
}

pub async fn submit_run(
    State(state): State<AppState>,
    Json(body): Json<RunBody>,
) -> Result<Json<RunResponse>, ApiError> {
    let cache_key: [u8; 32] = *blake3::hash(body.code.as_bytes()).as_bytes();
    if let Some(cached) = state.cache.get(&cache_key) {
        tracing::debug!("run cache hit");
        return Ok(Json(cached.clone()));
    }

    // Syntax failures surface without execution and are cacheable: the
    // same source will fail the same way.
    let instrumented = match instrument(&body.code) {
        Ok(instrumented) => instrumented,
        Err(err) => {
            let response = RunResponse {
                code: body.code,
                steps: None,
                error: Some(err.to_failure()),
            };
            state.cache.insert(cache_key, response.clone());
            return Ok(Json(response));
        }
    };

    let client = body
        .client
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let strategy = body.strategy.unwrap_or(state.strategy);
    let request = RunRequest::new(&body.code).with_transpiled(instrumented.source);

    let handle = state.runs.submit(&client, request, strategy)?;
    let run_id = handle.id();
    let mut outcome = handle.wait().await;

    let superseded = !state.runs.is_current(&client, run_id);
    state.runs.finish(&client, run_id);
    let cancelled = matches!(&outcome.error, Some(err) if err.kind == "Cancelled");
    if superseded || cancelled {
        // The newer run owns this client now; this result is discarded.
        return Ok(Json(RunResponse {
            code: body.code,
            steps: None,
            error: Some(RunFailure::new("Cancelled", "superseded by a newer run")),
        }));
    }

    insert_wait_steps(&mut outcome.steps, WAIT_GAP_THRESHOLD_MS);
    let steps = if outcome.steps.is_empty() {
        None
    } else {
        Some(
            serde_json::to_string(&outcome.steps)
                .map_err(|err| ApiError::InternalError(err.to_string()))?,
        )
    };

    let response = RunResponse {
        code: body.code,
        steps,
        error: outcome.error,
    };
    state.cache.insert(cache_key, response.clone());
    Ok(Json(response))
}
