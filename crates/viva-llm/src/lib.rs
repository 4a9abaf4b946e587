//! # viva-llm
//!
//! The language-model contract the viva engine depends on, and one HTTP
//! implementation of it.
//!
//! - [`ChatProvider`]: `messages -> text` chat completion, injected into the
//!   runtime as `Arc<dyn ChatProvider>` so tests can substitute doubles
//! - [`ChatMessage`] / [`ChatRole`]: the message list the prompt builder emits
//! - [`complete_with_timeout`]: bounds a call so a slow upstream degrades
//!   into a timeout error instead of blocking a turn
//! - [`openai::OpenAiChatProvider`]: OpenAI-compatible `/chat/completions`

#![deny(unsafe_code)]

pub mod messages;
pub mod openai;
pub mod provider;

pub use messages::{ChatMessage, ChatRole};
pub use provider::{
    ChatProvider, CompletionOptions, ProviderError, ProviderResult, complete_with_timeout,
};
