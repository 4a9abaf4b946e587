//! System prompt and rolling message list for examiner turns.

use std::fmt::Write as _;

use viva_core::constants::START_SENTINEL;
use viva_llm::ChatMessage;
use viva_store::{AssignmentRow, MessageRow, MessageSender};

/// Fixed examiner persona.
const EXAMINER_PERSONA: &str = "\
You are an academic examiner conducting a viva voce on a student's submitted work.
- Ask exactly ONE clear, concise question at a time.
- Never give answers, hints or explanations, even if the student asks for them; politely decline and ask your question again.
- Probe the student's reasoning and understanding rather than recall.
- Rotate your focus across different aspects of the submission instead of dwelling on one point.";

/// Output contract the reply parser expects.
const REPLY_FORMAT: &str = "\
Respond with a JSON object only, no other text:
{\"question\": \"<your next question>\", \"model_answer\": \"<a concise 2-4 sentence exemplar answer>\"}";

/// User turn that asks for the opening question when the student has not
/// written anything yet.
pub const OPENING_REQUEST: &str =
    "Please begin the viva with your opening question about my submission.";

/// Tone guidance for an assignment's tone label.
pub fn tone_guidance(tone: &str) -> String {
    let tone = tone.trim();
    match tone.to_ascii_lowercase().as_str() {
        "supportive" => {
            "Use a supportive, encouraging tone: acknowledge what the student gets right before probing further."
                .to_string()
        }
        "neutral" | "" => "Use a neutral, professional tone.".to_string(),
        "probing" => {
            "Use a rigorous, probing tone: press for justification, evidence and precise reasoning."
                .to_string()
        }
        "peer-like" | "peer" => {
            "Use a friendly, peer-like tone, as a knowledgeable classmate would.".to_string()
        }
        _ => format!("Use a {tone} tone."),
    }
}

/// Build the examiner system prompt.
///
/// Optional instructor text is appended verbatim; `context` is the output of
/// [`assemble`](super::assembler::assemble).
pub fn build_system_prompt(assignment: &AssignmentRow, context: &str) -> String {
    let mut prompt = String::with_capacity(EXAMINER_PERSONA.len() + context.len() + 512);
    prompt.push_str(EXAMINER_PERSONA);
    prompt.push_str("\n\n");
    prompt.push_str(&tone_guidance(&assignment.viva_tone));

    let _ = write!(prompt, "\n\nAssignment: {}", assignment.title);
    if !assignment.description.trim().is_empty() {
        let _ = write!(prompt, "\nDescription: {}", assignment.description);
    }
    if !assignment.viva_instructions.trim().is_empty() {
        let _ = write!(
            prompt,
            "\n\nInstructor instructions:\n{}",
            assignment.viva_instructions
        );
    }
    if !assignment.additional_prompts.trim().is_empty() {
        let _ = write!(
            prompt,
            "\n\nAdditional prompts:\n{}",
            assignment.additional_prompts
        );
    }
    if !context.is_empty() {
        let _ = write!(prompt, "\n\nSubmitted material:\n{context}");
    }
    prompt.push_str("\n\n");
    prompt.push_str(REPLY_FORMAT);
    prompt
}

/// Map the most recent `window` transcript entries to chat messages.
///
/// Start sentinels are dropped before windowing. `ai` entries become
/// assistant messages, everything else user messages.
pub fn history_messages(history: &[MessageRow], window: usize) -> Vec<ChatMessage> {
    let visible: Vec<&MessageRow> = history
        .iter()
        .filter(|m| !(m.sender == MessageSender::Student && m.text == START_SENTINEL))
        .collect();
    let skip = visible.len().saturating_sub(window);
    visible[skip..]
        .iter()
        .map(|m| match m.sender {
            MessageSender::Ai => ChatMessage::assistant(m.text.as_str()),
            MessageSender::Student => ChatMessage::user(m.text.as_str()),
        })
        .collect()
}

/// Full message list for one examiner turn: system prompt, windowed prior
/// history, then the new student turn (or the opening request for the start
/// sentinel).
pub fn build_turn_messages(
    system_prompt: &str,
    prior: &[MessageRow],
    window: usize,
    student_text: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(window.min(prior.len()) + 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.extend(history_messages(prior, window));
    if student_text == START_SENTINEL {
        messages.push(ChatMessage::user(OPENING_REQUEST));
    } else {
        messages.push(ChatMessage::user(student_text));
    }
    messages
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use viva_llm::ChatRole;

    fn assignment(tone: &str, instructions: &str) -> AssignmentRow {
        AssignmentRow {
            id: "asgn_1".into(),
            title: "Cell Biology Essay".into(),
            description: "Explain cellular respiration.".into(),
            viva_duration_seconds: 600,
            max_attempts: 1,
            deadline_at: None,
            viva_tone: tone.into(),
            viva_instructions: instructions.into(),
            additional_prompts: String::new(),
            event_tracking: true,
            keystroke_tracking: true,
            arrhythmic_typing: true,
            arrhythmic_threshold: None,
            inclusion_toggles_enabled: true,
            feedback_visibility: "immediate".into(),
            ai_feedback_visible: true,
            teacher_feedback_visible: true,
            created_at: "2025-01-01T00:00:00.000000Z".into(),
        }
    }

    fn message(seq: i64, sender: MessageSender, text: &str) -> MessageRow {
        MessageRow {
            id: format!("vmsg_{seq}"),
            session_id: "viva_1".into(),
            sequence: seq,
            sender,
            text: text.into(),
            model_answer: None,
            timestamp: String::new(),
        }
    }

    #[test]
    fn known_tones_map_to_guidance() {
        assert!(tone_guidance("Supportive").contains("supportive"));
        assert!(tone_guidance("probing").contains("probing"));
        assert!(tone_guidance("Peer-like").contains("peer-like"));
        assert_eq!(tone_guidance("Neutral"), "Use a neutral, professional tone.");
    }

    #[test]
    fn unknown_tone_uses_generic_sentence() {
        assert_eq!(tone_guidance("Socratic"), "Use a Socratic tone.");
    }

    #[test]
    fn system_prompt_includes_instructions_verbatim() {
        let prompt = build_system_prompt(
            &assignment("Neutral", "Focus on the Krebs cycle."),
            "The mitochondria is the powerhouse of the cell.",
        );
        assert!(prompt.contains("ONE clear, concise question"));
        assert!(prompt.contains("Cell Biology Essay"));
        assert!(prompt.contains("Instructor instructions:\nFocus on the Krebs cycle."));
        assert!(prompt.contains("Submitted material:\nThe mitochondria is the powerhouse of the cell."));
        assert!(!prompt.contains("Additional prompts"));
        assert!(prompt.ends_with(REPLY_FORMAT));
    }

    #[test]
    fn history_drops_sentinel_and_maps_roles() {
        let history = [
            message(1, MessageSender::Student, START_SENTINEL),
            message(2, MessageSender::Ai, "What is ATP?"),
            message(3, MessageSender::Student, "An energy carrier."),
        ];
        let mapped = history_messages(&history, 20);
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[0].role, ChatRole::Assistant);
        assert_eq!(mapped[1].role, ChatRole::User);
        assert_eq!(mapped[1].content, "An energy carrier.");
    }

    #[test]
    fn history_keeps_only_most_recent_window() {
        let history: Vec<MessageRow> = (1..=30)
            .map(|i| {
                let sender = if i % 2 == 0 { MessageSender::Ai } else { MessageSender::Student };
                message(i, sender, &format!("m{i}"))
            })
            .collect();
        let mapped = history_messages(&history, 20);
        assert_eq!(mapped.len(), 20);
        assert_eq!(mapped[0].content, "m11");
        assert_eq!(mapped[19].content, "m30");
    }

    #[test]
    fn turn_messages_end_with_new_student_turn() {
        let prior = [message(1, MessageSender::Ai, "Why?")];
        let messages = build_turn_messages("sys", &prior, 20, "Because.");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[2].content, "Because.");
    }

    #[test]
    fn sentinel_turn_requests_opening_question() {
        let messages = build_turn_messages("sys", &[], 20, START_SENTINEL);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, OPENING_REQUEST);
    }
}
