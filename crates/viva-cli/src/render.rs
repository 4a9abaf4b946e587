//! Plain-text rendering of session data for terminal output.

use std::fmt::Write as _;

use viva_runtime::{FeedbackView, TranscriptEntry};
use viva_store::MessageSender;

/// One flag per line.
pub fn flags(flags: &[String]) -> String {
    if flags.is_empty() {
        return "no integrity flags".to_string();
    }
    flags.join("\n")
}

/// `STUDENT:` / `EXAMINER:` lines, with indented model answers when present.
pub fn transcript(entries: &[TranscriptEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let speaker = match entry.sender {
            MessageSender::Student => "STUDENT",
            MessageSender::Ai => "EXAMINER",
        };
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, "{speaker}: {}", entry.text);
        if let Some(answer) = &entry.model_answer {
            let _ = write!(out, "\n  model answer: {answer}");
        }
    }
    out
}

/// AI and teacher feedback sections.
pub fn feedback(view: &FeedbackView) -> String {
    let ai = view.ai_text.as_deref().unwrap_or("(none)");
    let teacher = match (&view.teacher_text, &view.teacher_author) {
        (Some(text), Some(author)) => format!("{text}\n  by {author}"),
        (Some(text), None) => text.clone(),
        (None, _) => "(none)".to_string(),
    };
    format!("AI feedback:\n{ai}\n\nTeacher feedback:\n{teacher}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sender: MessageSender, text: &str, answer: Option<&str>) -> TranscriptEntry {
        TranscriptEntry {
            sequence: 0,
            sender,
            text: text.into(),
            model_answer: answer.map(String::from),
            timestamp: "2025-01-01T00:00:00.000000Z".into(),
        }
    }

    #[test]
    fn empty_flags_say_so() {
        assert_eq!(flags(&[]), "no integrity flags");
        assert_eq!(
            flags(&["Paste events detected (2×).".into(), "AI message copied (1×).".into()]),
            "Paste events detected (2×).\nAI message copied (1×)."
        );
    }

    #[test]
    fn transcript_labels_speakers() {
        let out = transcript(&[
            entry(MessageSender::Student, "__start__", None),
            entry(MessageSender::Ai, "Why?", Some("Because.")),
        ]);
        assert_eq!(out, "STUDENT: __start__\nEXAMINER: Why?\n  model answer: Because.");
    }

    #[test]
    fn feedback_shows_missing_sections() {
        let out = feedback(&FeedbackView {
            ai_text: None,
            teacher_text: Some("Good.".into()),
            teacher_author: Some("t1".into()),
        });
        assert_eq!(out, "AI feedback:\n(none)\n\nTeacher feedback:\nGood.\n  by t1");
    }
}
