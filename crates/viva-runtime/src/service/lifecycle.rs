//! Session start and inclusion toggles.

use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, info};
use viva_core::identity::Caller;
use viva_core::time::parse_timestamp;
use viva_store::{
    AssignmentRow, InclusionEntry, InclusionKind, MaterializeMode, OpenSession,
    OpenSessionOutcome, ResourceRow, SessionRow, SubmissionRow, ToggleOutcome,
};

use super::{InclusionState, StartRequest, StartedSession, VivaService, require_owner};
use crate::errors::{Result, VivaError};

impl VivaService {
    /// Start a viva on `submission_id`, or return the one already running.
    ///
    /// An active session is reused without re-checking the deadline or the
    /// attempt ceiling, so repeated start calls within one attempt are
    /// idempotent. Inclusion links are (re)materialized every time: an
    /// explicit set overwrites, the default only fills in missing links.
    pub fn start_session(
        &self,
        caller: &Caller,
        submission_id: &str,
        request: &StartRequest,
    ) -> Result<StartedSession> {
        let submission = self
            .store
            .get_submission(submission_id)?
            .ok_or_else(|| VivaError::not_found("submission", submission_id))?;
        if !caller.owns(&submission.student_id) {
            return Err(VivaError::forbidden("submission", &caller.user_id));
        }
        let assignment = self.load_assignment(&submission.assignment_id)?;

        let candidates = self.store.list_student_submissions(
            &assignment.id,
            &submission.student_id,
            false,
        )?;
        let resources = self.store.list_resources(&assignment.id)?;

        if self.store.find_active_session(submission_id)?.is_none() {
            check_deadline(&assignment)?;
            if !anything_selected(&candidates, &resources, request) {
                debug!(submission_id, "start rejected, nothing selected");
                return Err(VivaError::NothingSelected);
            }
        }
        let (session, attempts_used, reused) = self.open(&submission, &assignment)?;

        self.materialize(&session, &candidates, &resources, request)?;

        let attempts_left = if assignment.max_attempts > 0 {
            (assignment.max_attempts - attempts_used).max(0)
        } else {
            -1
        };
        info!(
            session_id = %session.id,
            submission_id,
            reused,
            attempts_used,
            attempts_left,
            "viva session started"
        );

        Ok(StartedSession {
            attempts_left,
            attempts_used,
            reused,
            included_submissions: self.inclusion_states(&session.id, InclusionKind::Submission)?,
            included_resources: self.inclusion_states(&session.id, InclusionKind::Resource)?,
            session_id: session.id,
        })
    }

    /// Reuse-or-create under the store's transactional guard.
    fn open(
        &self,
        submission: &SubmissionRow,
        assignment: &AssignmentRow,
    ) -> Result<(SessionRow, i64, bool)> {
        let outcome = self.store.open_session(&OpenSession {
            submission_id: &submission.id,
            assignment_id: &assignment.id,
            student_id: &submission.student_id,
            max_attempts: assignment.max_attempts,
        })?;
        match outcome {
            OpenSessionOutcome::Reused {
                session,
                attempts_used,
            } => Ok((session, attempts_used, true)),
            OpenSessionOutcome::Created {
                session,
                attempts_used,
            } => Ok((session, attempts_used, false)),
            OpenSessionOutcome::AttemptsExhausted { attempts_used } => {
                debug!(
                    submission_id = %submission.id,
                    attempts_used,
                    max_attempts = assignment.max_attempts,
                    "start rejected, no attempts remaining"
                );
                Err(VivaError::NoAttemptsRemaining {
                    max_attempts: assignment.max_attempts,
                })
            }
        }
    }

    fn materialize(
        &self,
        session: &SessionRow,
        candidates: &[SubmissionRow],
        resources: &[ResourceRow],
        request: &StartRequest,
    ) -> Result<()> {
        let (submission_entries, submission_mode) = match &request.included_submission_ids {
            Some(ids) => {
                let selected: HashSet<&str> = ids.iter().map(String::as_str).collect();
                let entries = candidates
                    .iter()
                    .map(|s| entry(InclusionKind::Submission, &s.id, selected.contains(s.id.as_str())))
                    .collect::<Vec<_>>();
                (entries, MaterializeMode::Overwrite)
            }
            None => {
                let entries = candidates
                    .iter()
                    .map(|s| entry(InclusionKind::Submission, &s.id, true))
                    .collect::<Vec<_>>();
                (entries, MaterializeMode::KeepExisting)
            }
        };
        self.store
            .materialize_inclusions(&session.id, &submission_entries, submission_mode)?;

        let (resource_entries, resource_mode) = match &request.included_resource_ids {
            Some(ids) => {
                let selected: HashSet<&str> = ids.iter().map(String::as_str).collect();
                let entries = resources
                    .iter()
                    .map(|r| entry(InclusionKind::Resource, &r.id, selected.contains(r.id.as_str())))
                    .collect::<Vec<_>>();
                (entries, MaterializeMode::Overwrite)
            }
            None => {
                let entries = resources
                    .iter()
                    .map(|r| entry(InclusionKind::Resource, &r.id, r.included))
                    .collect::<Vec<_>>();
                (entries, MaterializeMode::KeepExisting)
            }
        };
        self.store
            .materialize_inclusions(&session.id, &resource_entries, resource_mode)?;
        Ok(())
    }

    /// Include or exclude one submission or resource for an active session.
    pub fn toggle_inclusion(
        &self,
        caller: &Caller,
        session_id: &str,
        kind: InclusionKind,
        target_id: &str,
        included: bool,
    ) -> Result<InclusionState> {
        let session = self.load_session(session_id)?;
        require_owner(caller, &session)?;
        if !session.is_active() {
            debug!(session_id, "toggle rejected, session ended");
            return Err(VivaError::SessionEnded);
        }
        let assignment = self.load_assignment(&session.assignment_id)?;
        if !assignment.inclusion_toggles_enabled {
            return Err(VivaError::TogglesDisabled);
        }
        self.require_target(&session, kind, target_id)?;

        match self
            .store
            .set_inclusion_if_active(session_id, kind, target_id, included)?
        {
            ToggleOutcome::Applied => {
                info!(session_id, ?kind, target_id, included, "inclusion toggled");
                Ok(InclusionState {
                    id: target_id.to_string(),
                    included,
                })
            }
            ToggleOutcome::SessionEnded => Err(VivaError::SessionEnded),
            ToggleOutcome::SessionNotFound => Err(VivaError::not_found("session", session_id)),
        }
    }

    /// A toggle target must be the student's own non-placeholder submission
    /// or a resource of the session's assignment.
    fn require_target(&self, session: &SessionRow, kind: InclusionKind, target_id: &str) -> Result<()> {
        let belongs = match kind {
            InclusionKind::Submission => self.store.get_submission(target_id)?.is_some_and(|s| {
                s.assignment_id == session.assignment_id
                    && s.student_id == session.student_id
                    && !s.is_placeholder
            }),
            InclusionKind::Resource => self
                .store
                .get_resource(target_id)?
                .is_some_and(|r| r.assignment_id == session.assignment_id),
        };
        if belongs {
            Ok(())
        } else {
            Err(VivaError::not_found(
                match kind {
                    InclusionKind::Submission => "submission",
                    InclusionKind::Resource => "resource",
                },
                target_id,
            ))
        }
    }
}

fn entry(kind: InclusionKind, target_id: &str, included: bool) -> InclusionEntry {
    InclusionEntry {
        kind,
        target_id: target_id.to_string(),
        included,
    }
}

fn check_deadline(assignment: &AssignmentRow) -> Result<()> {
    let passed = assignment
        .deadline_at
        .as_deref()
        .and_then(parse_timestamp)
        .is_some_and(|deadline| Utc::now() > deadline);
    if passed {
        debug!(assignment_id = %assignment.id, "start rejected, deadline passed");
        Err(VivaError::DeadlinePassed)
    } else {
        Ok(())
    }
}

/// Whether the effective selection names at least one submission or resource.
fn anything_selected(
    candidates: &[SubmissionRow],
    resources: &[ResourceRow],
    request: &StartRequest,
) -> bool {
    let any_submission = match &request.included_submission_ids {
        Some(ids) => candidates.iter().any(|s| ids.contains(&s.id)),
        None => !candidates.is_empty(),
    };
    let any_resource = match &request.included_resource_ids {
        Some(ids) => resources.iter().any(|r| ids.contains(&r.id)),
        None => resources.iter().any(|r| r.included),
    };
    any_submission || any_resource
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
