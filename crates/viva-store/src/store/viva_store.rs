//! Transactional `VivaStore` API.
//!
//! Composes repository calls into the operations the runtime needs. Every
//! method checks out a pooled connection, runs to completion and returns
//! owned rows. Writes that read before they write (`open_session`,
//! `append_message`, `set_inclusion_if_active`, `materialize_inclusions`) run in
//! `BEGIN IMMEDIATE` transactions so concurrent callers serialize on the database
//! write lock instead of racing between their read and their write.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde_json::Value;
use tracing::{debug, info, warn};
use viva_core::time::now_timestamp;

use crate::errors::{Result, StoreError};
use crate::sqlite::connection::{self, ConnectionConfig, ConnectionPool, PooledConnection};
use crate::sqlite::migrations::run_migrations;
use crate::sqlite::repositories::assignment::{AssignmentRepo, NewAssignment};
use crate::sqlite::repositories::blob::BlobRepo;
use crate::sqlite::repositories::inclusion::{InclusionKind, InclusionRepo, MaterializeMode};
use crate::sqlite::repositories::interaction::InteractionRepo;
use crate::sqlite::repositories::message::MessageRepo;
use crate::sqlite::repositories::resource::{NewResource, ResourceRepo};
use crate::sqlite::repositories::session::SessionRepo;
use crate::sqlite::repositories::submission::{NewSubmission, SubmissionRepo};
use crate::sqlite::row_types::{
    AssignmentRow, InclusionRow, InteractionRow, MessageRow, MessageSender, ResourceRow,
    SessionRow, SubmissionRow,
};

/// Request to open (or reuse) the active session of a submission.
#[derive(Clone, Debug)]
pub struct OpenSession<'a> {
    /// Anchoring submission.
    pub submission_id: &'a str,
    /// Assignment of the submission.
    pub assignment_id: &'a str,
    /// Student owning the submission.
    pub student_id: &'a str,
    /// Attempt ceiling; `0` or negative means unlimited.
    pub max_attempts: i64,
}

/// Result of [`VivaStore::open_session`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OpenSessionOutcome {
    /// An unended session already existed and was returned as-is.
    Reused {
        /// The active session.
        session: SessionRow,
        /// Sessions the student has started for the assignment.
        attempts_used: i64,
    },
    /// A new session was created.
    Created {
        /// The new session.
        session: SessionRow,
        /// Sessions the student has started, including this one.
        attempts_used: i64,
    },
    /// No active session exists and the attempt ceiling is reached.
    AttemptsExhausted {
        /// Sessions the student has started for the assignment.
        attempts_used: i64,
    },
}

/// One inclusion link to materialize.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InclusionEntry {
    /// Submission or resource.
    pub kind: InclusionKind,
    /// Target id.
    pub target_id: String,
    /// Whether the target is in scope.
    pub included: bool,
}

/// Result of [`VivaStore::set_inclusion_if_active`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// The link now carries the requested flag.
    Applied,
    /// The session has ended; nothing was written.
    SessionEnded,
    /// No such session.
    SessionNotFound,
}

/// A behavioral event ready to persist.
#[derive(Clone, Debug, PartialEq)]
pub struct NewInteraction {
    /// Event type.
    pub event_type: String,
    /// Sanitized payload.
    pub event_data: Value,
}

/// High-level store wrapping a connection pool and all repositories.
pub struct VivaStore {
    pool: ConnectionPool,
}

impl VivaStore {
    /// Wrap an existing pool. The schema must already be migrated.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// Open a file-backed store and apply pending migrations.
    pub fn open(path: &str, config: &ConnectionConfig) -> Result<Self> {
        let store = Self::new(connection::new_file(path, config)?);
        let applied = store.migrate()?;
        info!(path, applied, "viva store opened");
        Ok(store)
    }

    /// Open a migrated in-memory store.
    pub fn in_memory() -> Result<Self> {
        let store = Self::new(connection::new_in_memory(&ConnectionConfig::default())?);
        let _ = store.migrate()?;
        Ok(store)
    }

    /// Apply pending migrations. Returns how many ran.
    pub fn migrate(&self) -> Result<u32> {
        let conn = self.conn()?;
        run_migrations(&conn)
    }

    /// Current schema version.
    pub fn schema_version(&self) -> Result<u32> {
        let conn = self.conn()?;
        crate::sqlite::migrations::current_version(&conn)
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    fn immediate(conn: &Connection) -> Result<Transaction<'_>> {
        Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Assignments, submissions, resources, blobs
    // ─────────────────────────────────────────────────────────────────────

    /// Create an assignment.
    pub fn create_assignment(&self, new: &NewAssignment) -> Result<AssignmentRow> {
        let conn = self.conn()?;
        AssignmentRepo::create(&conn, new)
    }

    /// Get an assignment.
    pub fn get_assignment(&self, assignment_id: &str) -> Result<Option<AssignmentRow>> {
        let conn = self.conn()?;
        AssignmentRepo::get_by_id(&conn, assignment_id)
    }

    /// Set the legacy visibility label and its boolean flags.
    pub fn set_feedback_visibility(&self, assignment_id: &str, label: &str) -> Result<bool> {
        let conn = self.conn()?;
        AssignmentRepo::set_feedback_visibility(&conn, assignment_id, label)
    }

    /// Create a submission.
    pub fn create_submission(&self, new: &NewSubmission) -> Result<SubmissionRow> {
        let conn = self.conn()?;
        SubmissionRepo::create(&conn, new)
    }

    /// Get a submission.
    pub fn get_submission(&self, submission_id: &str) -> Result<Option<SubmissionRow>> {
        let conn = self.conn()?;
        SubmissionRepo::get_by_id(&conn, submission_id)
    }

    /// A student's submissions for an assignment, in creation order.
    pub fn list_student_submissions(
        &self,
        assignment_id: &str,
        student_id: &str,
        include_placeholders: bool,
    ) -> Result<Vec<SubmissionRow>> {
        let conn = self.conn()?;
        SubmissionRepo::list_for_student(&conn, assignment_id, student_id, include_placeholders)
    }

    /// The student's placeholder submission, if any.
    pub fn find_placeholder(&self, assignment_id: &str, student_id: &str) -> Result<Option<SubmissionRow>> {
        let conn = self.conn()?;
        SubmissionRepo::find_placeholder(&conn, assignment_id, student_id)
    }

    /// Replace a submission's extracted text.
    pub fn update_submission_text(&self, submission_id: &str, text: &str) -> Result<bool> {
        let conn = self.conn()?;
        SubmissionRepo::update_text(&conn, submission_id, text)
    }

    /// Create a resource.
    pub fn create_resource(&self, new: &NewResource) -> Result<ResourceRow> {
        let conn = self.conn()?;
        ResourceRepo::create(&conn, new)
    }

    /// Get a resource.
    pub fn get_resource(&self, resource_id: &str) -> Result<Option<ResourceRow>> {
        let conn = self.conn()?;
        ResourceRepo::get_by_id(&conn, resource_id)
    }

    /// All resources of an assignment, in creation order.
    pub fn list_resources(&self, assignment_id: &str) -> Result<Vec<ResourceRow>> {
        let conn = self.conn()?;
        ResourceRepo::list_for_assignment(&conn, assignment_id)
    }

    /// Store bytes, returning the blob id.
    pub fn put_blob(&self, name: &str, content: &[u8]) -> Result<String> {
        let conn = self.conn()?;
        BlobRepo::store(&conn, name, content)
    }

    /// Load bytes by blob id.
    pub fn get_blob(&self, blob_id: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.conn()?;
        BlobRepo::get_content(&conn, blob_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Session lifecycle
    // ─────────────────────────────────────────────────────────────────────

    /// Get a session.
    pub fn get_session(&self, session_id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::get_by_id(&conn, session_id)
    }

    /// The unended session of a submission, if any.
    pub fn find_active_session(&self, submission_id: &str) -> Result<Option<SessionRow>> {
        let conn = self.conn()?;
        SessionRepo::find_active(&conn, submission_id)
    }

    /// Reuse the submission's active session or create one, enforcing the
    /// attempt ceiling.
    ///
    /// The active-session lookup, attempt count and insert share one
    /// immediate transaction. The partial unique index on active sessions
    /// backs this up: if an insert still collides, the winner is re-read and
    /// returned as reused.
    pub fn open_session(&self, req: &OpenSession<'_>) -> Result<OpenSessionOutcome> {
        let conn = self.conn()?;
        let tx = Self::immediate(&conn)?;

        let attempts_used = SessionRepo::count_attempts(&tx, req.assignment_id, req.student_id)?;
        if let Some(session) = SessionRepo::find_active(&tx, req.submission_id)? {
            tx.commit()?;
            debug!(session_id = %session.id, "reusing active session");
            return Ok(OpenSessionOutcome::Reused {
                session,
                attempts_used,
            });
        }

        if req.max_attempts > 0 && attempts_used >= req.max_attempts {
            return Ok(OpenSessionOutcome::AttemptsExhausted { attempts_used });
        }

        let created = SessionRepo::create(
            &tx,
            req.submission_id,
            req.assignment_id,
            req.student_id,
            &now_timestamp(),
        );
        match created {
            Ok(session) => {
                tx.commit()?;
                info!(session_id = %session.id, submission_id = req.submission_id, "session created");
                Ok(OpenSessionOutcome::Created {
                    session,
                    attempts_used: attempts_used + 1,
                })
            }
            Err(StoreError::Sqlite(e)) if is_constraint_violation(&e) => {
                drop(tx);
                warn!(submission_id = req.submission_id, "concurrent session insert, re-reading winner");
                let session = SessionRepo::find_active(&conn, req.submission_id)?.ok_or_else(|| {
                    StoreError::NotFound {
                        kind: "active session",
                        id: req.submission_id.to_string(),
                    }
                })?;
                let attempts_used = SessionRepo::count_attempts(&conn, req.assignment_id, req.student_id)?;
                Ok(OpenSessionOutcome::Reused {
                    session,
                    attempts_used,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Set `ended_at`/`duration_seconds` if the session is still active.
    /// Returns `false` when another call already ended it.
    pub fn mark_session_ended(&self, session_id: &str, ended_at: &str, duration_seconds: i64) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::mark_ended(&conn, session_id, ended_at, duration_seconds)
    }

    /// Store AI feedback unless some is already present.
    pub fn store_feedback(&self, session_id: &str, text: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::store_feedback(&conn, session_id, text)
    }

    /// Overwrite instructor feedback.
    pub fn set_teacher_feedback(&self, session_id: &str, text: &str, author: &str) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::set_teacher_feedback(&conn, session_id, text, author)
    }

    /// Set or clear the rating.
    pub fn set_rating(&self, session_id: &str, rating: Option<i64>) -> Result<bool> {
        let conn = self.conn()?;
        SessionRepo::set_rating(&conn, session_id, rating)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Inclusion links
    // ─────────────────────────────────────────────────────────────────────

    /// Upsert a batch of links in one transaction.
    pub fn materialize_inclusions(
        &self,
        session_id: &str,
        entries: &[InclusionEntry],
        mode: MaterializeMode,
    ) -> Result<()> {
        let conn = self.conn()?;
        let tx = Self::immediate(&conn)?;
        for entry in entries {
            InclusionRepo::upsert(&tx, session_id, entry.kind, &entry.target_id, entry.included, mode)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Links of one kind, in target creation order.
    pub fn list_inclusions(&self, session_id: &str, kind: InclusionKind) -> Result<Vec<InclusionRow>> {
        let conn = self.conn()?;
        InclusionRepo::list(&conn, session_id, kind)
    }

    /// Current flag of one link.
    pub fn get_inclusion(&self, session_id: &str, kind: InclusionKind, target_id: &str) -> Result<Option<bool>> {
        let conn = self.conn()?;
        InclusionRepo::get(&conn, session_id, kind, target_id)
    }

    /// Upsert one link, but only while the session is active.
    pub fn set_inclusion_if_active(
        &self,
        session_id: &str,
        kind: InclusionKind,
        target_id: &str,
        included: bool,
    ) -> Result<ToggleOutcome> {
        let conn = self.conn()?;
        let tx = Self::immediate(&conn)?;
        let Some(session) = SessionRepo::get_by_id(&tx, session_id)? else {
            return Ok(ToggleOutcome::SessionNotFound);
        };
        if !session.is_active() {
            return Ok(ToggleOutcome::SessionEnded);
        }
        InclusionRepo::upsert(&tx, session_id, kind, target_id, included, MaterializeMode::Overwrite)?;
        tx.commit()?;
        Ok(ToggleOutcome::Applied)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transcript
    // ─────────────────────────────────────────────────────────────────────

    /// Append a transcript entry with the next sequence number.
    pub fn append_message(
        &self,
        session_id: &str,
        sender: MessageSender,
        text: &str,
        model_answer: Option<&str>,
    ) -> Result<MessageRow> {
        let conn = self.conn()?;
        let tx = Self::immediate(&conn)?;
        let row = MessageRepo::append(&tx, session_id, sender, text, model_answer, &now_timestamp())?;
        tx.commit()?;
        Ok(row)
    }

    /// Full transcript in order.
    pub fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        let conn = self.conn()?;
        MessageRepo::list(&conn, session_id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Interaction logs
    // ─────────────────────────────────────────────────────────────────────

    /// Append events against a submission in one transaction.
    pub fn append_interactions(&self, submission_id: &str, events: &[NewInteraction]) -> Result<usize> {
        if events.is_empty() {
            return Ok(0);
        }
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let now = now_timestamp();
        for event in events {
            let _ = InteractionRepo::append(&tx, submission_id, &event.event_type, &event.event_data, &now)?;
        }
        tx.commit()?;
        Ok(events.len())
    }

    /// All events of a submission, oldest first.
    pub fn list_interactions(&self, submission_id: &str) -> Result<Vec<InteractionRow>> {
        let conn = self.conn()?;
        InteractionRepo::list_for_submission(&conn, submission_id)
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
