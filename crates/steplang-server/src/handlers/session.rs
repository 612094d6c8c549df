//! Session autosave endpoints.
//!
//! The editor periodically saves the code being edited; on load it restores
//! the last session before falling back to a default preset.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use steplang_storage::SESSION_KEY;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionBody {
    /// The autosaved source, or null when no session exists yet.
    pub code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SaveSessionBody {
    pub code: String,
}

/// `GET /api/session`
pub async fn get_session(State(state): State<AppState>) -> Result<Json<SessionBody>, ApiError> {
    let store = state.store.lock().await;
    let code = store.get(SESSION_KEY)?;
    Ok(Json(SessionBody { code }))
}

/// `PUT /api/session`
pub async fn save_session(
    State(state): State<AppState>,
    Json(body): Json<SaveSessionBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut store = state.store.lock().await;
    store.set(SESSION_KEY, &body.code)?;
    Ok(Json(serde_json::json!({ "success": true })))
}
