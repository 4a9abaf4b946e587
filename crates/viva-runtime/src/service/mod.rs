//! # Viva Service
//!
//! [`VivaService`] owns the session state machine (`NONE → ACTIVE → ENDED`)
//! and exposes the boundary operations the web layer calls:
//!
//! | Operation | Module |
//! |-----------|--------|
//! | `start_session`, `toggle_inclusion` | `lifecycle` |
//! | `post_turn`, `end_session` | `turns` |
//! | `log_events`, `compute_flags`, `flags_for`, `get_feedback`, `transcript`, `transcript_for`, `time_remaining`, `set_rating`, `set_teacher_feedback` | `review` |
//!
//! The service is stateless apart from its handles: every piece of session
//! state lives in the store, and the language model is injected.

mod lifecycle;
mod review;
mod turns;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use viva_core::identity::Caller;
use viva_llm::ChatProvider;
use viva_settings::VivaSettings;
use viva_store::{AssignmentRow, InclusionKind, InclusionRow, SessionRow, VivaStore};

use crate::errors::{Result, VivaError};
use crate::examiner::TurnStatus;

pub use review::TranscriptEntry;

/// Session orchestration over a store and a chat provider.
pub struct VivaService {
    store: Arc<VivaStore>,
    provider: Arc<dyn ChatProvider>,
    settings: VivaSettings,
}

impl VivaService {
    /// Create a service.
    pub fn new(store: Arc<VivaStore>, provider: Arc<dyn ChatProvider>, settings: VivaSettings) -> Self {
        Self {
            store,
            provider,
            settings,
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<VivaStore> {
        &self.store
    }

    /// Active settings.
    pub fn settings(&self) -> &VivaSettings {
        &self.settings
    }

    fn load_session(&self, session_id: &str) -> Result<SessionRow> {
        self.store
            .get_session(session_id)?
            .ok_or_else(|| VivaError::not_found("session", session_id))
    }

    fn load_assignment(&self, assignment_id: &str) -> Result<AssignmentRow> {
        self.store
            .get_assignment(assignment_id)?
            .ok_or_else(|| VivaError::not_found("assignment", assignment_id))
    }

    fn inclusion_states(&self, session_id: &str, kind: InclusionKind) -> Result<Vec<InclusionState>> {
        Ok(self
            .store
            .list_inclusions(session_id, kind)?
            .into_iter()
            .map(InclusionState::from)
            .collect())
    }
}

/// Only the student owning the session may act as its participant.
fn require_owner(caller: &Caller, session: &SessionRow) -> Result<()> {
    if caller.owns(&session.student_id) {
        Ok(())
    } else {
        Err(VivaError::forbidden("session", &caller.user_id))
    }
}

/// The owning student and instructors may read a session.
fn require_reader(caller: &Caller, session: &SessionRow) -> Result<()> {
    if caller.owns(&session.student_id) || caller.is_instructor() {
        Ok(())
    } else {
        Err(VivaError::forbidden("session", &caller.user_id))
    }
}

fn require_instructor(caller: &Caller) -> Result<()> {
    if caller.is_instructor() {
        Ok(())
    } else {
        Err(VivaError::forbidden("session", &caller.user_id))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Boundary types
// ─────────────────────────────────────────────────────────────────────────────

/// Optional explicit inclusion sets for a start call. `None` applies the
/// natural default for that kind.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    /// Submissions to include; every other submission of the student is
    /// excluded.
    #[serde(default)]
    pub included_submission_ids: Option<Vec<String>>,
    /// Resources to include; every other resource is excluded.
    #[serde(default)]
    pub included_resource_ids: Option<Vec<String>>,
}

/// One resolved inclusion link.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionState {
    /// Submission or resource id.
    pub id: String,
    /// Whether it is in scope.
    pub included: bool,
}

impl From<InclusionRow> for InclusionState {
    fn from(row: InclusionRow) -> Self {
        Self {
            id: row.target_id,
            included: row.included,
        }
    }
}

/// Result of a start call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSession {
    /// Active session id.
    pub session_id: String,
    /// Attempts remaining after this one; `-1` when unlimited.
    pub attempts_left: i64,
    /// Sessions the student has started for the assignment.
    pub attempts_used: i64,
    /// Whether an existing active session was returned.
    pub reused: bool,
    /// Submission links in creation order.
    pub included_submissions: Vec<InclusionState>,
    /// Resource links in creation order.
    pub included_resources: Vec<InclusionState>,
}

/// Who is posting a turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    /// The student taking the viva.
    #[default]
    Student,
    /// An instructor reviewing it. Never triggers an examiner turn.
    Instructor,
}

/// A post-turn call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnRequest {
    /// Sender.
    #[serde(default)]
    pub sender: SenderKind,
    /// Student answer, the start sentinel, or instructor feedback text.
    #[serde(default)]
    pub text: Option<String>,
    /// Rating to record.
    #[serde(default)]
    pub rating: Option<i64>,
    /// End the session after this turn.
    #[serde(default)]
    pub ended: bool,
    /// Client-measured duration, used when ending.
    #[serde(default)]
    pub duration_seconds: Option<i64>,
}

impl TurnRequest {
    /// A student message.
    pub fn student(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A rating-only update.
    pub fn rating(sender: SenderKind, rating: i64) -> Self {
        Self {
            sender,
            rating: Some(rating),
            ..Self::default()
        }
    }

    /// An end signal.
    pub fn end(duration_seconds: Option<i64>) -> Self {
        Self {
            ended: true,
            duration_seconds,
            ..Self::default()
        }
    }
}

/// Result of a post-turn call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    /// Examiner question, when a turn ran.
    pub ai_text: Option<String>,
    /// Exemplar answer for that question.
    pub ai_model_answer: Option<String>,
    /// AI feedback, when the session ended on this call.
    pub feedback_text: Option<String>,
    /// Whether the assignment lets students see AI feedback.
    pub feedback_visible: Option<bool>,
    /// `error` when fallback text stands in for the model.
    pub status: TurnStatus,
    /// Whether the session is ended after this call.
    pub ended: bool,
}

/// Result of ending a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndOutcome {
    /// Stored AI feedback. `None` while another call is still generating it.
    pub feedback_text: Option<String>,
    /// Whether the session had already been ended by an earlier call.
    pub already_ended: bool,
    /// `error` when fallback feedback was stored.
    pub status: TurnStatus,
}

/// Feedback fields of a session. Visibility is decided by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    /// AI-generated feedback.
    pub ai_text: Option<String>,
    /// Instructor feedback.
    pub teacher_text: Option<String>,
    /// Author of the instructor feedback.
    pub teacher_author: Option<String>,
}
