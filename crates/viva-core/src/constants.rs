//! Package-level constants.

/// Current version of the viva engine (sourced from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name.
pub const NAME: &str = "viva";

/// Transcript text a client sends to request the opening question.
///
/// Persisted like any other student message so ordering is preserved,
/// but never forwarded to the language model.
pub const START_SENTINEL: &str = "__start__";
