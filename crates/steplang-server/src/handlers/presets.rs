//! Preset catalog endpoints.
//!
//! The catalog merges the built-in presets (code) with user-saved presets
//! (storage, `preset:` keys). A stored preset shadows a built-in of the
//! same name.

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use steplang_storage::{preset_key, presets, PRESET_PREFIX};

use crate::error::ApiError;
use crate::state::AppState;

/// One preset in the listing.
#[derive(Debug, Serialize)]
pub struct PresetSummary {
    pub name: String,
    /// Whether the preset is built in (not user-saved).
    pub builtin: bool,
}

/// A named preset source.
#[derive(Debug, Serialize)]
pub struct PresetBody {
    pub name: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SavePresetBody {
    pub code: String,
}

/// `GET /api/presets` -- built-ins first (menu order), then user presets.
pub async fn list_presets(
    State(state): State<AppState>,
) -> Result<Json<Vec<PresetSummary>>, ApiError> {
    let mut listing: Vec<PresetSummary> = presets::builtin_presets()
        .iter()
        .map(|(name, _)| PresetSummary {
            name: name.to_string(),
            builtin: true,
        })
        .collect();

    let store = state.store.lock().await;
    for key in store.list(PRESET_PREFIX)? {
        let name = key[PRESET_PREFIX.len()..].to_string();
        if !listing.iter().any(|preset| preset.name == name) {
            listing.push(PresetSummary {
                name,
                builtin: false,
            });
        }
    }
    Ok(Json(listing))
}

/// `GET /api/presets/{name}` -- stored presets shadow built-ins.
pub async fn get_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<PresetBody>, ApiError> {
    let stored = {
        let store = state.store.lock().await;
        store.get(&preset_key(&name))?
    };
    let code = stored
        .or_else(|| presets::builtin_preset(&name).map(|source| source.to_string()))
        .ok_or_else(|| ApiError::NotFound(format!("preset '{}'", name)))?;
    Ok(Json(PresetBody { name, code }))
}

/// `PUT /api/presets/{name}` -- saves a user preset.
pub async fn save_preset(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<SavePresetBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::BadRequest("preset name must not be empty".into()));
    }
    let mut store = state.store.lock().await;
    store.set(&preset_key(&name), &body.code)?;
    Ok(Json(serde_json::json!({ "success": true })))
}
