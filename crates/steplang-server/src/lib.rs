//! HTTP server for the steplang tracing pipeline.
//!
//! Exposes run submission (instrument, isolate, trace), the preset catalog,
//! and session autosave persistence over a small JSON API. See
//! [`router::build_router`] for the route table.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
