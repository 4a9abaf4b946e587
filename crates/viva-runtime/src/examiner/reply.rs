//! Examiner reply parsing.
//!
//! Three stages, each tried only when the previous one fails:
//!
//! 1. The whole reply (code fences stripped) is a JSON object with a
//!    `question` key.
//! 2. An object is salvaged from the first `{` to the last `}`.
//! 3. The raw text is the question and there is no model answer.
//!
//! Parsing never fails; the worst case is stage 3.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static EMBEDDED_OBJECT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}").ok());

/// Which stage produced a reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseStage {
    /// The reply was a JSON object.
    Structured,
    /// An object was found inside surrounding prose.
    Salvaged,
    /// The reply was used as plain text.
    RawText,
}

/// Parsed examiner reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExaminerReply {
    /// Next question, trimmed. May be empty; the turn engine substitutes
    /// a fallback.
    pub question: String,
    /// Exemplar answer; `None` when absent or blank.
    pub model_answer: Option<String>,
    /// Stage that produced this reply.
    pub stage: ParseStage,
}

/// Parse a raw completion into a question and optional model answer.
pub fn parse_reply(raw: &str) -> ExaminerReply {
    if let Some(reply) = from_json(&strip_code_fences(raw), ParseStage::Structured) {
        return reply;
    }
    if let Some(reply) = EMBEDDED_OBJECT
        .as_ref()
        .and_then(|re| re.find(raw))
        .and_then(|m| from_json(m.as_str(), ParseStage::Salvaged))
    {
        return reply;
    }
    ExaminerReply {
        question: raw.trim().to_string(),
        model_answer: None,
        stage: ParseStage::RawText,
    }
}

fn from_json(text: &str, stage: ParseStage) -> Option<ExaminerReply> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;
    let question = object.get("question")?;
    let model_answer = object
        .get("model_answer")
        .or_else(|| object.get("modelAnswer"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);
    Some(ExaminerReply {
        question: question.as_str().unwrap_or_default().trim().to_string(),
        model_answer,
        stage,
    })
}

/// Strip a surrounding Markdown code fence, with or without a `json` tag.
pub(crate) fn strip_code_fences(s: &str) -> String {
    let trimmed = s.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.strip_suffix("```").unwrap_or(rest).trim().to_string()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.strip_suffix("```").unwrap_or(rest).trim().to_string()
    } else {
        trimmed.to_string()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
