//! Viva session repository.
//!
//! The end-of-session writes are conditional updates: `mark_ended` only
//! touches a session whose `ended_at` is still null, and `store_feedback`
//! only fills an empty `feedback_text`. Both report whether they won, which
//! is what makes ending a session write-once under retries.

use rusqlite::{Connection, OptionalExtension, params};
use viva_core::ids::SessionId;

use crate::errors::Result;
use crate::sqlite::row_types::SessionRow;

/// Session repository — stateless, every method takes `&Connection`.
pub struct SessionRepo;

impl SessionRepo {
    /// Insert an active session anchored to `submission`.
    pub fn create(
        conn: &Connection,
        submission_id: &str,
        assignment_id: &str,
        student_id: &str,
        started_at: &str,
    ) -> Result<SessionRow> {
        let id = SessionId::new().into_inner();
        let _ = conn.execute(
            "INSERT INTO viva_sessions (id, submission_id, assignment_id, student_id, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, submission_id, assignment_id, student_id, started_at],
        )?;
        Ok(SessionRow {
            id,
            submission_id: submission_id.to_string(),
            assignment_id: assignment_id.to_string(),
            student_id: student_id.to_string(),
            started_at: started_at.to_string(),
            ended_at: None,
            duration_seconds: None,
            feedback_text: None,
            teacher_feedback_text: None,
            teacher_feedback_author: None,
            rating: None,
        })
    }

    /// Get a session by ID.
    pub fn get_by_id(conn: &Connection, session_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM viva_sessions WHERE id = ?1",
                params![session_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// The unended session anchored to a submission, if any.
    pub fn find_active(conn: &Connection, submission_id: &str) -> Result<Option<SessionRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM viva_sessions WHERE submission_id = ?1 AND ended_at IS NULL",
                params![submission_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Sessions a student has started for an assignment, ended or not.
    pub fn count_attempts(conn: &Connection, assignment_id: &str, student_id: &str) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM viva_sessions WHERE assignment_id = ?1 AND student_id = ?2",
            params![assignment_id, student_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Set `ended_at` and `duration_seconds` if the session is still active.
    pub fn mark_ended(
        conn: &Connection,
        session_id: &str,
        ended_at: &str,
        duration_seconds: i64,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE viva_sessions SET ended_at = ?1, duration_seconds = ?2
             WHERE id = ?3 AND ended_at IS NULL",
            params![ended_at, duration_seconds, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Fill `feedback_text` if it is still empty.
    pub fn store_feedback(conn: &Connection, session_id: &str, text: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE viva_sessions SET feedback_text = ?1
             WHERE id = ?2 AND feedback_text IS NULL",
            params![text, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Overwrite the instructor feedback overlay.
    pub fn set_teacher_feedback(
        conn: &Connection,
        session_id: &str,
        text: &str,
        author: &str,
    ) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE viva_sessions SET teacher_feedback_text = ?1, teacher_feedback_author = ?2
             WHERE id = ?3",
            params![text, author, session_id],
        )?;
        Ok(changed > 0)
    }

    /// Set or clear the rating.
    pub fn set_rating(conn: &Connection, session_id: &str, rating: Option<i64>) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE viva_sessions SET rating = ?1 WHERE id = ?2",
            params![rating, session_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
        Ok(SessionRow {
            id: row.get("id")?,
            submission_id: row.get("submission_id")?,
            assignment_id: row.get("assignment_id")?,
            student_id: row.get("student_id")?,
            started_at: row.get("started_at")?,
            ended_at: row.get("ended_at")?,
            duration_seconds: row.get("duration_seconds")?,
            feedback_text: row.get("feedback_text")?,
            teacher_feedback_text: row.get("teacher_feedback_text")?,
            teacher_feedback_author: row.get("teacher_feedback_author")?,
            rating: row.get("rating")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
