//! Database row types.
//!
//! These mirror the table shapes. Booleans are stored as `0`/`1` integers and
//! timestamps as RFC 3339 text (see [`viva_core::time`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Row from the `assignments` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRow {
    /// Assignment ID.
    pub id: String,
    /// Title shown to students and the examiner.
    pub title: String,
    /// Free-text description.
    pub description: String,
    /// Configured viva length.
    pub viva_duration_seconds: i64,
    /// Attempt ceiling per student; `0` means unlimited.
    pub max_attempts: i64,
    /// Optional deadline (RFC 3339).
    pub deadline_at: Option<String>,
    /// Examiner tone label.
    pub viva_tone: String,
    /// Instructor-authored viva instructions.
    pub viva_instructions: String,
    /// Additional instructor prompts.
    pub additional_prompts: String,
    /// Gate for focus, paste, copy and early-end rules.
    pub event_tracking: bool,
    /// Gate for the response-gap rule and cadence events.
    pub keystroke_tracking: bool,
    /// Gate for the arrhythmic-typing rule.
    pub arrhythmic_typing: bool,
    /// Assignment-specific arrhythmic-typing threshold.
    pub arrhythmic_threshold: Option<i64>,
    /// Whether students may toggle inclusion links mid-viva.
    pub inclusion_toggles_enabled: bool,
    /// Legacy visibility label, kept in sync with the boolean flags.
    pub feedback_visibility: String,
    /// Whether students may see AI feedback.
    pub ai_feedback_visible: bool,
    /// Whether students may see teacher feedback.
    pub teacher_feedback_visible: bool,
    /// Creation timestamp.
    pub created_at: String,
}

/// Row from the `submissions` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRow {
    /// Submission ID.
    pub id: String,
    /// Owning assignment.
    pub assignment_id: String,
    /// Owning student.
    pub student_id: String,
    /// Original file name, if uploaded as a file.
    pub file_name: Option<String>,
    /// Stored bytes, if uploaded as a file.
    pub blob_id: Option<String>,
    /// Extracted plain text (may be empty).
    pub extracted_text: String,
    /// Synthesized only to anchor a resource-only viva.
    pub is_placeholder: bool,
    /// Creation timestamp.
    pub created_at: String,
}

/// Row from the `assignment_resources` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRow {
    /// Resource ID.
    pub id: String,
    /// Owning assignment.
    pub assignment_id: String,
    /// Original file name.
    pub file_name: String,
    /// Stored bytes.
    pub blob_id: Option<String>,
    /// Extracted plain text (may be empty).
    pub extracted_text: String,
    /// Assignment-wide default inclusion.
    pub included: bool,
    /// Creation timestamp.
    pub created_at: String,
}

/// Row from the `viva_sessions` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRow {
    /// Session ID.
    pub id: String,
    /// Anchoring submission.
    pub submission_id: String,
    /// Assignment of the anchoring submission.
    pub assignment_id: String,
    /// Student owning the anchoring submission.
    pub student_id: String,
    /// Creation timestamp, immutable.
    pub started_at: String,
    /// End timestamp (null while active).
    pub ended_at: Option<String>,
    /// Duration recorded at end.
    pub duration_seconds: Option<i64>,
    /// AI-generated feedback, written once.
    pub feedback_text: Option<String>,
    /// Instructor feedback overlay.
    pub teacher_feedback_text: Option<String>,
    /// Author of the instructor feedback.
    pub teacher_feedback_author: Option<String>,
    /// Optional score.
    pub rating: Option<i64>,
}

impl SessionRow {
    /// Whether the session has not been ended yet.
    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// One inclusion link for a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InclusionRow {
    /// Submission or resource id.
    pub target_id: String,
    /// Whether the target is in scope.
    pub included: bool,
}

/// Who wrote a transcript entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSender {
    /// The student taking the viva.
    Student,
    /// The AI examiner.
    Ai,
}

impl MessageSender {
    /// Persisted form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Ai => "ai",
        }
    }

    /// Parse the persisted form. Anything other than `ai` is a student entry.
    pub fn from_db(value: &str) -> Self {
        if value == "ai" { Self::Ai } else { Self::Student }
    }
}

/// Row from the `viva_messages` table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    /// Message ID.
    pub id: String,
    /// Owning session.
    pub session_id: String,
    /// Per-session insertion order, starting at 1.
    pub sequence: i64,
    /// Author.
    pub sender: MessageSender,
    /// Message text (the question, for AI entries).
    pub text: String,
    /// Exemplar answer attached to AI entries.
    pub model_answer: Option<String>,
    /// Insertion timestamp.
    pub timestamp: String,
}

/// Row from the `interaction_logs` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InteractionRow {
    /// Entry ID.
    pub id: String,
    /// Owning submission.
    pub submission_id: String,
    /// Event type (`blur`, `paste`, ...).
    pub event_type: String,
    /// Sanitized payload, carrying `session_id` when logged by a session.
    pub event_data: Value,
    /// Insertion timestamp.
    pub timestamp: String,
}

impl InteractionRow {
    /// Session id embedded in the payload, if any.
    pub fn session_tag(&self) -> Option<&str> {
        self.event_data.get("session_id").and_then(Value::as_str)
    }
}

/// Metadata of a stored blob (content excluded).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRow {
    /// Blob ID.
    pub id: String,
    /// Name the bytes were saved under.
    pub name: String,
    /// SHA-256 of the content, hex encoded.
    pub hash: String,
    /// Content length in bytes.
    pub size: i64,
    /// Creation timestamp.
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_roundtrips_and_defaults_to_student() {
        assert_eq!(MessageSender::from_db(MessageSender::Ai.as_str()), MessageSender::Ai);
        assert_eq!(MessageSender::from_db("student"), MessageSender::Student);
        assert_eq!(MessageSender::from_db("instructor"), MessageSender::Student);
    }

    #[test]
    fn session_tag_reads_payload() {
        let row = InteractionRow {
            id: "ilog_1".into(),
            submission_id: "subm_1".into(),
            event_type: "blur".into(),
            event_data: serde_json::json!({"session_id": "viva_9"}),
            timestamp: "t".into(),
        };
        assert_eq!(row.session_tag(), Some("viva_9"));
    }
}
