//! Language model settings.
//!
//! The engine talks to any OpenAI-compatible chat completion endpoint. The
//! API key itself never lives in the settings file; only the name of the
//! environment variable holding it does.

use serde::{Deserialize, Serialize};

/// Chat completion endpoint and per-call parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSettings {
    /// Base URL of the API (without `/chat/completions`).
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model id.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Token ceiling for an examiner question.
    pub max_tokens: u32,
    /// Token ceiling for a supplementary model-answer call.
    pub model_answer_max_tokens: u32,
    /// Token ceiling for end-of-session feedback.
    pub feedback_max_tokens: u32,
    /// Upper bound on a single call, after which fallback text is used.
    pub timeout_ms: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.4,
            max_tokens: 200,
            model_answer_max_tokens: 200,
            feedback_max_tokens: 400,
            timeout_ms: 30_000,
        }
    }
}

impl LlmSettings {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let llm = LlmSettings::default();
        assert_eq!(llm.model, "gpt-4o-mini");
        assert!((llm.temperature - 0.4).abs() < f64::EPSILON);
        assert_eq!(llm.max_tokens, 200);
        assert_eq!(llm.timeout_ms, 30_000);
    }

    #[test]
    fn missing_key_env_is_none() {
        let llm = LlmSettings {
            api_key_env: "VIVA_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..LlmSettings::default()
        };
        assert!(llm.api_key().is_none());
    }
}
