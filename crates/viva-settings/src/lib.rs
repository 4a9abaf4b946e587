//! # viva-settings
//!
//! Configuration for the viva engine, loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`VivaSettings::default()`]
//! 2. **User file** — `~/.viva/settings.json` (deep-merged over defaults)
//! 3. **Environment variables** — `VIVA_*` overrides (highest priority)
//!
//! Settings are plain values handed to the store, provider and runtime at
//! construction time; nothing reads them from process-wide state.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path, viva_home};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_work() {
        let _settings = VivaSettings::default();
        let path = settings_path();
        assert!(path.ends_with(".viva/settings.json"));
    }
}
