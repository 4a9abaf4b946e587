//! Event logging, integrity flags, feedback overlays and transcripts.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use viva_core::identity::Caller;
use viva_core::time::{elapsed_seconds, parse_timestamp};
use viva_store::{MessageRow, MessageSender};

use super::{FeedbackView, VivaService, require_instructor, require_owner, require_reader};
use crate::errors::Result;
use crate::events::{EventBatch, LogOutcome, normalize};
use crate::integrity::{self, IntegrityConfig};

/// One transcript entry as exposed to callers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    /// Position in the session.
    pub sequence: i64,
    /// `student` or `ai`.
    pub sender: MessageSender,
    /// Message text.
    pub text: String,
    /// Exemplar answer; only ever populated for instructors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_answer: Option<String>,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl TranscriptEntry {
    fn from_row(row: MessageRow, include_model_answer: bool) -> Self {
        Self {
            sequence: row.sequence,
            sender: row.sender,
            text: row.text,
            model_answer: row.model_answer.filter(|_| include_model_answer),
            timestamp: row.timestamp,
        }
    }
}

impl VivaService {
    /// Persist client events for a session's submission.
    ///
    /// Event types outside the assignment's enabled vocabulary are dropped,
    /// and so is everything posted after the session ended.
    pub fn log_events(&self, caller: &Caller, session_id: &str, batch: EventBatch) -> Result<LogOutcome> {
        let session = self.load_session(session_id)?;
        require_owner(caller, &session)?;
        if !session.is_active() {
            let ignored = batch.into_events().len();
            debug!(session_id, ignored, "events on ended session ignored");
            return Ok(LogOutcome { logged: 0, ignored });
        }
        let assignment = self.load_assignment(&session.assignment_id)?;
        let (accepted, ignored) = normalize(
            batch,
            &assignment,
            session_id,
            self.settings.events.payload_string_cap,
        );
        let logged = self
            .store
            .append_interactions(&session.submission_id, &accepted)?;
        debug!(session_id, logged, ignored, "events logged");
        Ok(LogOutcome { logged, ignored })
    }

    /// Integrity flags for a session, in rule order.
    pub fn compute_flags(&self, session_id: &str) -> Result<Vec<String>> {
        let session = self.load_session(session_id)?;
        let assignment = self.load_assignment(&session.assignment_id)?;
        let events = self.store.list_interactions(&session.submission_id)?;
        let scoped = integrity::filter_session_events(&session, &events, Utc::now());
        let messages = self.store.list_messages(session_id)?;
        let config = IntegrityConfig::for_assignment(
            &assignment,
            self.settings.integrity.default_arrhythmic_threshold,
        );
        Ok(integrity::compute_flags(&session, &scoped, &messages, &config))
    }

    /// [`Self::compute_flags`] for a caller allowed to read the session.
    pub fn flags_for(&self, caller: &Caller, session_id: &str) -> Result<Vec<String>> {
        let session = self.load_session(session_id)?;
        require_reader(caller, &session)?;
        self.compute_flags(session_id)
    }

    /// Stored AI and teacher feedback. Visibility is the caller's concern.
    pub fn get_feedback(&self, session_id: &str) -> Result<FeedbackView> {
        let session = self.load_session(session_id)?;
        Ok(FeedbackView {
            ai_text: session.feedback_text,
            teacher_text: session.teacher_feedback_text,
            teacher_author: session.teacher_feedback_author,
        })
    }

    /// Overwrite the instructor feedback of a session.
    pub fn set_teacher_feedback(&self, caller: &Caller, session_id: &str, text: &str) -> Result<()> {
        require_instructor(caller)?;
        let session = self.load_session(session_id)?;
        let _ = self
            .store
            .set_teacher_feedback(&session.id, text, &caller.user_id)?;
        info!(session_id, author = %caller.user_id, "teacher feedback stored");
        Ok(())
    }

    /// Set or clear the session rating.
    pub fn set_rating(&self, caller: &Caller, session_id: &str, rating: Option<i64>) -> Result<()> {
        let session = self.load_session(session_id)?;
        require_reader(caller, &session)?;
        let _ = self.store.set_rating(&session.id, rating)?;
        debug!(session_id, ?rating, "rating updated");
        Ok(())
    }

    /// Seconds left on the viva clock; `0` once ended or elapsed.
    pub fn time_remaining(&self, session_id: &str) -> Result<i64> {
        let session = self.load_session(session_id)?;
        if !session.is_active() {
            return Ok(0);
        }
        let assignment = self.load_assignment(&session.assignment_id)?;
        let elapsed = parse_timestamp(&session.started_at)
            .map_or(0, |started| elapsed_seconds(started, Utc::now()));
        Ok((assignment.viva_duration_seconds - elapsed).max(0))
    }

    /// Full transcript in order, optionally with model answers.
    pub fn transcript(&self, session_id: &str, include_model_answers: bool) -> Result<Vec<TranscriptEntry>> {
        let _ = self.load_session(session_id)?;
        Ok(self
            .store
            .list_messages(session_id)?
            .into_iter()
            .map(|row| TranscriptEntry::from_row(row, include_model_answers))
            .collect())
    }

    /// Transcript as `caller` may see it: instructors get model answers,
    /// the owning student does not.
    pub fn transcript_for(&self, caller: &Caller, session_id: &str) -> Result<Vec<TranscriptEntry>> {
        let session = self.load_session(session_id)?;
        require_reader(caller, &session)?;
        self.transcript(session_id, caller.is_instructor())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
