//! Application state shared across handlers.
//!
//! The [`TextStore`] sits behind `Arc<tokio::sync::Mutex<..>>`: the SQLite
//! backend holds a `rusqlite::Connection` (which is `!Sync`), so handlers
//! await an async-aware lock instead of sharing the store directly. The
//! run-response cache and the run registry are concurrent maps and need no
//! lock.

use std::sync::Arc;

use dashmap::DashMap;

use steplang_harness::{ExecConfig, IsolationStrategy, RunManager, WorkerSpec};
use steplang_storage::{InMemoryStore, SqliteStore, TextStore};

use crate::error::ApiError;
use crate::handlers::run::RunResponse;

/// Cache key: the blake3 hash of the submitted source.
pub type CodeHash = [u8; 32];

/// Shared application state for the HTTP server.
#[derive(Clone)]
pub struct AppState {
    /// In-flight run registry with replace-on-supersede semantics.
    pub runs: Arc<RunManager>,
    /// Finished run responses keyed by source hash -- resubmitting
    /// identical code replays the cached outcome.
    pub cache: Arc<DashMap<CodeHash, RunResponse>>,
    /// Preset and session persistence (async Mutex -- non-blocking await).
    pub store: Arc<tokio::sync::Mutex<Box<dyn TextStore>>>,
    /// Default isolation strategy for submissions that don't pick one.
    pub strategy: IsolationStrategy,
}

impl AppState {
    /// Creates state backed by a SQLite database at `db_path`.
    pub fn new(db_path: &str, strategy: IsolationStrategy, worker: WorkerSpec) -> Result<Self, ApiError> {
        let store = SqliteStore::new(db_path)?;
        Ok(Self::with_store(Box::new(store), strategy, worker))
    }

    /// Creates state with an in-memory store (for testing).
    pub fn in_memory() -> Self {
        Self::with_store(
            Box::new(InMemoryStore::new()),
            IsolationStrategy::Thread,
            WorkerSpec::default(),
        )
    }

    fn with_store(
        store: Box<dyn TextStore>,
        strategy: IsolationStrategy,
        worker: WorkerSpec,
    ) -> Self {
        AppState {
            runs: Arc::new(RunManager::new(ExecConfig::default(), worker)),
            cache: Arc::new(DashMap::new()),
            store: Arc::new(tokio::sync::Mutex::new(store)),
            strategy,
        }
    }
}
