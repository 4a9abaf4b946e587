//! Engine tuning: context budgets, integrity defaults, event intake.

use serde::{Deserialize, Serialize};

/// Character budgets for assembled context and the transcript window.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextSettings {
    /// Global budget across all sources.
    pub max_total_chars: usize,
    /// Cap for any single resource or submission.
    pub max_source_chars: usize,
    /// Most recent transcript entries forwarded to the model.
    pub history_window: usize,
    /// Cap on extracted submission text.
    pub submission_text_cap: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            max_total_chars: 12_000,
            max_source_chars: 4_000,
            history_window: 20,
            submission_text_cap: 50_000,
        }
    }
}

/// Integrity rule defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntegritySettings {
    /// Arrhythmic-typing anomaly count that raises a flag when an
    /// assignment does not set its own threshold.
    pub default_arrhythmic_threshold: u32,
}

impl Default for IntegritySettings {
    fn default() -> Self {
        Self {
            default_arrhythmic_threshold: 5,
        }
    }
}

/// Behavioral event intake.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSettings {
    /// Longest string kept in a sanitized event payload.
    pub payload_string_cap: usize,
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            payload_string_cap: 500,
        }
    }
}
