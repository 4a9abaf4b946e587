//! Database settings.

use serde::{Deserialize, Serialize};

use crate::loader::viva_home;

/// `SQLite` database location and pool sizing.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseSettings {
    /// Path to the database file.
    pub path: String,
    /// Maximum pooled connections.
    pub pool_size: u32,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: viva_home().join("viva.db").to_string_lossy().into_owned(),
            pool_size: 16,
            busy_timeout_ms: 30_000,
        }
    }
}
