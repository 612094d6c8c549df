//! Binary entrypoint for the steplang HTTP server.
//!
//! Reads configuration from environment variables:
//! - `STEPLANG_DB_PATH`: SQLite database file path (default: "steplang.db")
//! - `STEPLANG_PORT`: Server listen port (default: "3000")
//! - `STEPLANG_ISOLATION`: default isolation strategy, "thread" or
//!   "process" (default: "thread")
//! - `STEPLANG_WORKER_BIN`: worker binary for process isolation (default:
//!   resolve `steplang` on PATH)

use steplang_harness::{IsolationStrategy, WorkerSpec};
use steplang_server::router::build_router;
use steplang_server::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let db_path = std::env::var("STEPLANG_DB_PATH").unwrap_or_else(|_| "steplang.db".to_string());
    let port = std::env::var("STEPLANG_PORT").unwrap_or_else(|_| "3000".to_string());
    let strategy = match std::env::var("STEPLANG_ISOLATION").as_deref() {
        Ok("process") => IsolationStrategy::Process,
        _ => IsolationStrategy::Thread,
    };
    let worker = match std::env::var("STEPLANG_WORKER_BIN") {
        Ok(bin) => WorkerSpec {
            program: bin.into(),
            args: vec!["worker".to_string()],
        },
        Err(_) => WorkerSpec {
            program: "steplang".into(),
            args: vec!["worker".to_string()],
        },
    };

    let state = AppState::new(&db_path, strategy, worker)
        .expect("Failed to initialize application state");

    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", port);
    tracing::info!("steplang server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
