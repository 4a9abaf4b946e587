//! One examiner turn against the language model.
//!
//! A turn always yields a non-empty question and a model answer. Upstream
//! failures degrade into fallback text and [`TurnStatus::Error`]; malformed
//! replies are recovered by the parser and are not errors.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use viva_llm::{ChatMessage, ChatProvider, CompletionOptions, complete_with_timeout};
use viva_settings::LlmSettings;

use super::reply::parse_reply;

/// Question used when the model fails or returns nothing usable.
pub const FALLBACK_QUESTION: &str = "Could you clarify that point a little more?";

/// Model answer used when none could be generated.
pub const FALLBACK_MODEL_ANSWER: &str =
    "A model answer could not be generated from the available submission context.";

/// Whether the language model served a turn or fallback text was used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    /// The model answered.
    #[default]
    Ok,
    /// The model was unavailable; fallback text stands in.
    Error,
}

impl TurnStatus {
    /// Combine two statuses; any error wins.
    pub fn and(self, other: Self) -> Self {
        if self == Self::Error || other == Self::Error {
            Self::Error
        } else {
            Self::Ok
        }
    }
}

/// Per-call parameters for examiner turns.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnConfig {
    /// Sampling temperature.
    pub temperature: f64,
    /// Token ceiling for the question call.
    pub max_tokens: u32,
    /// Token ceiling for the supplementary model-answer call.
    pub model_answer_max_tokens: u32,
    /// Bound on each call.
    pub timeout: Duration,
}

impl From<&LlmSettings> for TurnConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            model_answer_max_tokens: settings.model_answer_max_tokens,
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

/// Outcome of one turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExaminerTurn {
    /// Question to show the student. Never empty.
    pub question: String,
    /// Exemplar answer kept for instructors. Never empty.
    pub model_answer: String,
    /// Whether fallback text was used because the model was unavailable.
    pub status: TurnStatus,
}

/// Ask the model for the next question.
///
/// `context` is the assembled submission context, reused to ground the
/// supplementary model-answer call when the reply carries no answer.
pub async fn run_examiner_turn(
    provider: &dyn ChatProvider,
    messages: &[ChatMessage],
    context: &str,
    config: &TurnConfig,
) -> ExaminerTurn {
    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..CompletionOptions::default()
    };

    let raw = match complete_with_timeout(provider, messages, &options, config.timeout).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(error = %e, category = e.category(), "examiner call failed, using fallback question");
            return ExaminerTurn {
                question: FALLBACK_QUESTION.to_string(),
                model_answer: FALLBACK_MODEL_ANSWER.to_string(),
                status: TurnStatus::Error,
            };
        }
    };

    let reply = parse_reply(&raw);
    debug!(stage = ?reply.stage, "examiner reply parsed");

    let question = if reply.question.is_empty() {
        warn!("examiner reply had no question, using fallback question");
        FALLBACK_QUESTION.to_string()
    } else {
        reply.question
    };

    let model_answer = match reply.model_answer {
        Some(answer) => answer,
        None => generate_model_answer(provider, &question, context, config).await,
    };

    ExaminerTurn {
        question,
        model_answer,
        status: TurnStatus::Ok,
    }
}

/// Supplementary call synthesizing an exemplar answer for `question`.
async fn generate_model_answer(
    provider: &dyn ChatProvider,
    question: &str,
    context: &str,
    config: &TurnConfig,
) -> String {
    let messages = [
        ChatMessage::system(
            "You are an expert tutor writing exemplar answers to viva questions. \
             Answer in 2-4 concise sentences, grounded only in the material provided. \
             Reply with the answer text only.",
        ),
        ChatMessage::user(format!(
            "Material:\n{context}\n\nQuestion: {question}\n\nWrite the model answer."
        )),
    ];
    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.model_answer_max_tokens),
        ..CompletionOptions::default()
    };

    match complete_with_timeout(provider, &messages, &options, config.timeout).await {
        Ok(answer) if !answer.trim().is_empty() => answer.trim().to_string(),
        Ok(_) => {
            warn!("model answer call returned nothing, using fallback");
            FALLBACK_MODEL_ANSWER.to_string()
        }
        Err(e) => {
            warn!(error = %e, "model answer call failed, using fallback");
            FALLBACK_MODEL_ANSWER.to_string()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::ScriptedProvider;

    fn config() -> TurnConfig {
        TurnConfig {
            temperature: 0.4,
            max_tokens: 200,
            model_answer_max_tokens: 200,
            timeout: Duration::from_secs(5),
        }
    }

    fn messages() -> Vec<ChatMessage> {
        vec![ChatMessage::system("sys"), ChatMessage::user("hi")]
    }

    #[tokio::test]
    async fn structured_reply_needs_one_call() {
        let provider = ScriptedProvider::replies([
            r#"{"question": "What is ATP?", "model_answer": "The cell's energy currency."}"#,
        ]);
        let turn = run_examiner_turn(&provider, &messages(), "ctx", &config()).await;
        assert_eq!(turn.question, "What is ATP?");
        assert_eq!(turn.model_answer, "The cell's energy currency.");
        assert_eq!(turn.status, TurnStatus::Ok);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn missing_answer_triggers_supplementary_call() {
        let provider = ScriptedProvider::replies(["What is ATP?", "ATP stores energy."]);
        let turn = run_examiner_turn(&provider, &messages(), "ctx", &config()).await;
        assert_eq!(turn.question, "What is ATP?");
        assert_eq!(turn.model_answer, "ATP stores energy.");
        assert_eq!(provider.calls(), 2);
        let second = provider.request(1);
        assert!(second.messages[1].content.contains("Question: What is ATP?"));
        assert_eq!(second.options.max_tokens, Some(200));
    }

    #[tokio::test]
    async fn failed_supplementary_call_uses_fallback_answer() {
        let provider = ScriptedProvider::new(vec![Ok("What is ATP?".into()), Err(())]);
        let turn = run_examiner_turn(&provider, &messages(), "ctx", &config()).await;
        assert_eq!(turn.model_answer, FALLBACK_MODEL_ANSWER);
        assert_eq!(turn.status, TurnStatus::Ok);
    }

    #[tokio::test]
    async fn upstream_failure_uses_fallback_question() {
        let provider = ScriptedProvider::failing();
        let turn = run_examiner_turn(&provider, &messages(), "ctx", &config()).await;
        assert_eq!(turn.question, FALLBACK_QUESTION);
        assert_eq!(turn.model_answer, FALLBACK_MODEL_ANSWER);
        assert_eq!(turn.status, TurnStatus::Error);
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn empty_question_uses_fallback() {
        let provider = ScriptedProvider::replies([r#"{"question": "", "model_answer": "x"}"#]);
        let turn = run_examiner_turn(&provider, &messages(), "ctx", &config()).await;
        assert_eq!(turn.question, FALLBACK_QUESTION);
        assert_eq!(turn.model_answer, "x");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_times_out_into_fallback() {
        let provider = ScriptedProvider::replies(["late"]).with_delay(Duration::from_secs(60));
        let turn = run_examiner_turn(&provider, &messages(), "ctx", &config()).await;
        assert_eq!(turn.question, FALLBACK_QUESTION);
        assert_eq!(turn.status, TurnStatus::Error);
    }

    #[test]
    fn status_and_prefers_error() {
        assert_eq!(TurnStatus::Ok.and(TurnStatus::Ok), TurnStatus::Ok);
        assert_eq!(TurnStatus::Ok.and(TurnStatus::Error), TurnStatus::Error);
        assert_eq!(TurnStatus::Error.and(TurnStatus::Ok), TurnStatus::Error);
    }
}
