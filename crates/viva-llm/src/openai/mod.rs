//! `OpenAI`-compatible chat completions.
//!
//! Works against any server exposing `POST {base_url}/chat/completions` with
//! bearer authentication.

mod provider;
mod types;

pub use provider::OpenAiChatProvider;
pub use types::{DEFAULT_BASE_URL, OpenAiConfig};
