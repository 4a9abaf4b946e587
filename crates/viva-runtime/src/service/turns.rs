//! Conversational turns and session end.

use chrono::Utc;
use tracing::{debug, info};
use viva_core::constants::START_SENTINEL;
use viva_core::identity::Caller;
use viva_core::time::{elapsed_seconds, format_timestamp, parse_timestamp};
use viva_store::{MessageSender, SessionRow};

use super::{EndOutcome, SenderKind, TurnOutcome, TurnRequest, VivaService, require_instructor, require_owner};
use crate::context::{ContextBudget, assemble, build_system_prompt, build_turn_messages, load_sources};
use crate::errors::{Result, VivaError};
use crate::examiner::{ExaminerTurn, TurnConfig, TurnStatus, run_examiner_turn};
use crate::feedback::{FeedbackConfig, GeneratedFeedback, build_feedback_messages, format_transcript, generate_feedback};

impl VivaService {
    /// Handle one post from the chat.
    ///
    /// A request may carry any mix of text, a rating and an end signal.
    /// Student text on an active session runs an examiner turn; instructor
    /// text is stored as teacher feedback. Ratings never reach the model.
    pub async fn post_turn(
        &self,
        caller: &Caller,
        session_id: &str,
        request: TurnRequest,
    ) -> Result<TurnOutcome> {
        let session = self.load_session(session_id)?;
        match request.sender {
            SenderKind::Student => require_owner(caller, &session)?,
            SenderKind::Instructor => require_instructor(caller)?,
        }
        // Only the student may end their own session, whoever else may post.
        if request.ended {
            require_owner(caller, &session)?;
        }

        let text = request
            .text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        if text.is_none() && request.rating.is_none() && !request.ended {
            return Err(VivaError::EmptyMessage);
        }

        if let Some(rating) = request.rating {
            let _ = self.store.set_rating(session_id, Some(rating))?;
            debug!(session_id, rating, "rating recorded");
        }

        let mut outcome = TurnOutcome::default();
        if let Some(text) = text {
            match request.sender {
                SenderKind::Instructor => {
                    let _ = self
                        .store
                        .set_teacher_feedback(session_id, text, &caller.user_id)?;
                    info!(session_id, author = %caller.user_id, "teacher feedback stored");
                }
                SenderKind::Student if !session.is_active() => {
                    debug!(session_id, "message on ended session ignored");
                }
                SenderKind::Student => {
                    let turn = self.examiner_turn(&session, text).await?;
                    outcome.ai_text = Some(turn.question);
                    outcome.ai_model_answer = Some(turn.model_answer);
                    outcome.status = turn.status;
                }
            }
        }

        if request.ended {
            let end = self.finish(&session, request.duration_seconds).await?;
            let assignment = self.load_assignment(&session.assignment_id)?;
            outcome.feedback_text = end.feedback_text;
            outcome.feedback_visible = Some(assignment.ai_feedback_visible);
            outcome.status = outcome.status.and(end.status);
            outcome.ended = true;
        } else {
            outcome.ended = !session.is_active();
        }
        Ok(outcome)
    }

    /// End a session and generate its feedback, exactly once.
    ///
    /// Only the call whose conditional update ends the session runs the
    /// feedback generator. Every later call returns whatever feedback is
    /// stored, which is `None` while the winning call is still generating.
    pub async fn end_session(
        &self,
        caller: &Caller,
        session_id: &str,
        duration_seconds: Option<i64>,
    ) -> Result<EndOutcome> {
        let session = self.load_session(session_id)?;
        require_owner(caller, &session)?;
        self.finish(&session, duration_seconds).await
    }

    async fn examiner_turn(&self, session: &SessionRow, text: &str) -> Result<ExaminerTurn> {
        let student = self
            .store
            .append_message(&session.id, MessageSender::Student, text, None)?;
        let prior: Vec<_> = self
            .store
            .list_messages(&session.id)?
            .into_iter()
            .filter(|m| m.id != student.id)
            .collect();

        let assignment = self.load_assignment(&session.assignment_id)?;
        let context = assemble(
            &load_sources(&self.store, session)?,
            ContextBudget::from(&self.settings.context),
        );
        let system = build_system_prompt(&assignment, &context);
        let messages = build_turn_messages(&system, &prior, self.settings.context.history_window, text);

        let turn = run_examiner_turn(
            self.provider.as_ref(),
            &messages,
            &context,
            &TurnConfig::from(&self.settings.llm),
        )
        .await;

        let _ = self.store.append_message(
            &session.id,
            MessageSender::Ai,
            &turn.question,
            Some(&turn.model_answer),
        )?;
        debug!(
            session_id = %session.id,
            opening = text == START_SENTINEL,
            status = ?turn.status,
            "examiner turn recorded"
        );
        Ok(turn)
    }

    async fn finish(&self, session: &SessionRow, client_duration: Option<i64>) -> Result<EndOutcome> {
        if session.is_active() {
            let now = Utc::now();
            let duration = client_duration.map_or_else(
                || {
                    parse_timestamp(&session.started_at)
                        .map_or(0, |started| elapsed_seconds(started, now))
                },
                |d| d.max(0),
            );
            if self
                .store
                .mark_session_ended(&session.id, &format_timestamp(now), duration)?
            {
                info!(session_id = %session.id, duration_seconds = duration, "session ended");
                let feedback = self.session_feedback(session).await?;
                if self.store.store_feedback(&session.id, &feedback.text)? {
                    info!(session_id = %session.id, status = ?feedback.status, "feedback stored");
                }
                return Ok(EndOutcome {
                    feedback_text: Some(feedback.text),
                    already_ended: false,
                    status: feedback.status,
                });
            }
        }

        let current = self.load_session(&session.id)?;
        debug!(
            session_id = %session.id,
            feedback_pending = current.feedback_text.is_none(),
            "session already ended"
        );
        Ok(EndOutcome {
            feedback_text: current.feedback_text,
            already_ended: true,
            status: TurnStatus::Ok,
        })
    }

    async fn session_feedback(&self, session: &SessionRow) -> Result<GeneratedFeedback> {
        let assignment = self.load_assignment(&session.assignment_id)?;
        let context = assemble(
            &load_sources(&self.store, session)?,
            ContextBudget::from(&self.settings.context),
        );
        let transcript = format_transcript(
            &self.store.list_messages(&session.id)?,
            self.settings.context.history_window,
        );
        let messages = build_feedback_messages(&assignment, &context, &transcript);
        Ok(generate_feedback(
            self.provider.as_ref(),
            &messages,
            &FeedbackConfig::from(&self.settings.llm),
        )
        .await)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
