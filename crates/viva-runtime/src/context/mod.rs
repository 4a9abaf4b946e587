//! Context assembly and prompt construction.
//!
//! [`assembler`] decides which material backs a question and bounds it;
//! [`prompt`] wraps that material in the examiner persona and replays the
//! recent transcript.

pub mod assembler;
pub mod prompt;

pub use assembler::{
    ContextBudget, ContextSource, SourceKind, TRUNCATION_SUFFIX, assemble, load_sources,
};
pub use prompt::{build_system_prompt, build_turn_messages, history_messages, tone_guidance};
