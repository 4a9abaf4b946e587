//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production values. Every struct is `#[serde(default)]`,
//! so a settings file only needs the keys it changes.

mod database;
mod engine;
mod llm;

pub use database::*;
pub use engine::*;
pub use llm::*;

use serde::{Deserialize, Serialize};

/// Root settings type for the viva engine.
///
/// ```json
/// {
///   "llm": { "model": "gpt-4o-mini", "timeoutMs": 20000 },
///   "context": { "maxTotalChars": 16000 }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VivaSettings {
    /// Settings schema version.
    pub version: String,
    /// Database location and pool sizing.
    pub database: DatabaseSettings,
    /// Language model endpoint and call parameters.
    pub llm: LlmSettings,
    /// Context budgets and transcript window.
    pub context: ContextSettings,
    /// Integrity rule defaults.
    pub integrity: IntegritySettings,
    /// Behavioral event intake.
    pub events: EventSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for VivaSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            database: DatabaseSettings::default(),
            llm: LlmSettings::default(),
            context: ContextSettings::default(),
            integrity: IntegritySettings::default(),
            events: EventSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
