//! Persistence for the editing surface: presets and session text.
//!
//! The core pipeline treats persistence as an opaque collaborator with a
//! key/value text interface ([`TextStore`]): preset sources live under
//! `preset:` keys, the autosaved editor session under [`SESSION_KEY`]. Two
//! backends implement the contract with identical semantics:
//!
//! - [`InMemoryStore`]: first-class backend for tests and ephemeral use.
//! - [`SqliteStore`]: durable backend with WAL mode and schema migrations.
//!
//! The built-in preset catalog ([`presets`]) is code, not storage; stored
//! presets shadow built-ins of the same name at the API layer.

pub mod error;
pub mod memory;
pub mod presets;
pub mod schema;
pub mod sqlite;
pub mod traits;

pub use error::StorageError;
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::TextStore;

/// Key under which the last-edited session source is stored.
pub const SESSION_KEY: &str = "session:last";

/// Key prefix for user-saved presets.
pub const PRESET_PREFIX: &str = "preset:";

/// The storage key for a named user preset.
pub fn preset_key(name: &str) -> String {
    format!("{}{}", PRESET_PREFIX, name)
}
