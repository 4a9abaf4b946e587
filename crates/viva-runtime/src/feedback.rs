//! End-of-session feedback generation.
//!
//! One call over the windowed transcript and the assembled context, asking
//! for a single paragraph. The result (or [`FALLBACK_FEEDBACK`]) is stored
//! once by the session service and never regenerated.

use std::fmt::Write as _;
use std::time::Duration;

use tracing::{info, warn};
use viva_core::constants::START_SENTINEL;
use viva_llm::{ChatMessage, ChatProvider, CompletionOptions, complete_with_timeout};
use viva_settings::LlmSettings;
use viva_store::{AssignmentRow, MessageRow, MessageSender};

use crate::examiner::TurnStatus;
use crate::examiner::reply::strip_code_fences;

/// Stored when feedback could not be generated.
pub const FALLBACK_FEEDBACK: &str =
    "Automatic feedback could not be generated for this viva. Your instructor will review the transcript.";

const FEEDBACK_INSTRUCTIONS: &str = "\
You are an academic tutor writing qualitative feedback after a viva voce.
Write ONE paragraph addressed to the student covering strengths, areas to improve and any misconceptions shown in the viva.
Do not use bullet points or headings. Do not give a score or grade.
Do not mention artificial intelligence, automated examiners, or academic integrity monitoring.";

/// Parameters for the feedback call.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedbackConfig {
    /// Sampling temperature.
    pub temperature: f64,
    /// Token ceiling.
    pub max_tokens: u32,
    /// Bound on the call.
    pub timeout: Duration,
}

impl From<&LlmSettings> for FeedbackConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_tokens: settings.feedback_max_tokens,
            timeout: Duration::from_millis(settings.timeout_ms),
        }
    }
}

/// Generated (or fallback) feedback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedFeedback {
    /// Paragraph to store.
    pub text: String,
    /// Whether fallback text was used.
    pub status: TurnStatus,
}

/// Speaker-labeled transcript of the most recent `window` entries.
pub fn format_transcript(messages: &[MessageRow], window: usize) -> String {
    let visible: Vec<&MessageRow> = messages
        .iter()
        .filter(|m| !(m.sender == MessageSender::Student && m.text == START_SENTINEL))
        .collect();
    let skip = visible.len().saturating_sub(window);
    visible[skip..]
        .iter()
        .map(|m| {
            let speaker = match m.sender {
                MessageSender::Student => "STUDENT",
                MessageSender::Ai => "EXAMINER",
            };
            format!("{speaker}: {}", m.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Message list for the feedback call.
pub fn build_feedback_messages(
    assignment: &AssignmentRow,
    context: &str,
    transcript: &str,
) -> Vec<ChatMessage> {
    let mut prompt = format!("Assignment: {}", assignment.title);
    if !assignment.description.trim().is_empty() {
        let _ = write!(prompt, "\nDescription: {}", assignment.description);
    }
    let guidance: Vec<&str> = [
        assignment.viva_instructions.as_str(),
        assignment.additional_prompts.as_str(),
    ]
    .into_iter()
    .filter(|s| !s.trim().is_empty())
    .collect();
    if !guidance.is_empty() {
        let _ = write!(prompt, "\n\nInstructor guidance:\n{}", guidance.join("\n"));
    }
    if !context.is_empty() {
        let _ = write!(prompt, "\n\nSubmitted material:\n{context}");
    }
    let _ = write!(prompt, "\n\nViva transcript:\n{transcript}");

    vec![
        ChatMessage::system(FEEDBACK_INSTRUCTIONS),
        ChatMessage::user(prompt),
    ]
}

/// Run the feedback call, falling back on failure or an empty reply.
pub async fn generate_feedback(
    provider: &dyn ChatProvider,
    messages: &[ChatMessage],
    config: &FeedbackConfig,
) -> GeneratedFeedback {
    let options = CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..CompletionOptions::default()
    };
    match complete_with_timeout(provider, messages, &options, config.timeout).await {
        Ok(raw) => {
            let text = strip_code_fences(&raw);
            if text.is_empty() {
                warn!("feedback call returned nothing, using fallback");
                return fallback();
            }
            info!(chars = text.chars().count(), "feedback generated");
            GeneratedFeedback {
                text,
                status: TurnStatus::Ok,
            }
        }
        Err(e) => {
            warn!(error = %e, category = e.category(), "feedback call failed, using fallback");
            fallback()
        }
    }
}

fn fallback() -> GeneratedFeedback {
    GeneratedFeedback {
        text: FALLBACK_FEEDBACK.to_string(),
        status: TurnStatus::Error,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
