//! Submission repository.
//!
//! Submissions are listed in creation order (`created_at`, then `rowid` for
//! rows created within the same microsecond), which is the order context is
//! assembled in.

use rusqlite::{Connection, OptionalExtension, params};
use viva_core::ids::SubmissionId;
use viva_core::time::now_timestamp;

use super::get_bool;
use crate::errors::Result;
use crate::sqlite::row_types::SubmissionRow;

/// Fields for a new submission.
#[derive(Clone, Debug, Default)]
pub struct NewSubmission {
    /// Owning assignment.
    pub assignment_id: String,
    /// Owning student.
    pub student_id: String,
    /// Original file name.
    pub file_name: Option<String>,
    /// Stored bytes.
    pub blob_id: Option<String>,
    /// Extracted text.
    pub extracted_text: String,
    /// Placeholder marker.
    pub is_placeholder: bool,
}

/// Submission repository — stateless, every method takes `&Connection`.
pub struct SubmissionRepo;

impl SubmissionRepo {
    /// Insert a submission.
    pub fn create(conn: &Connection, new: &NewSubmission) -> Result<SubmissionRow> {
        let id = SubmissionId::new().into_inner();
        let now = now_timestamp();
        let _ = conn.execute(
            "INSERT INTO submissions (id, assignment_id, student_id, file_name, blob_id,
             extracted_text, is_placeholder, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                new.assignment_id,
                new.student_id,
                new.file_name,
                new.blob_id,
                new.extracted_text,
                new.is_placeholder,
                now,
            ],
        )?;
        Ok(SubmissionRow {
            id,
            assignment_id: new.assignment_id.clone(),
            student_id: new.student_id.clone(),
            file_name: new.file_name.clone(),
            blob_id: new.blob_id.clone(),
            extracted_text: new.extracted_text.clone(),
            is_placeholder: new.is_placeholder,
            created_at: now,
        })
    }

    /// Get a submission by ID.
    pub fn get_by_id(conn: &Connection, submission_id: &str) -> Result<Option<SubmissionRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM submissions WHERE id = ?1",
                params![submission_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// A student's submissions for an assignment, in creation order.
    pub fn list_for_student(
        conn: &Connection,
        assignment_id: &str,
        student_id: &str,
        include_placeholders: bool,
    ) -> Result<Vec<SubmissionRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM submissions
             WHERE assignment_id = ?1 AND student_id = ?2 AND (?3 OR is_placeholder = 0)
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![assignment_id, student_id, include_placeholders], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// The student's placeholder submission for an assignment, if one exists.
    pub fn find_placeholder(
        conn: &Connection,
        assignment_id: &str,
        student_id: &str,
    ) -> Result<Option<SubmissionRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM submissions
                 WHERE assignment_id = ?1 AND student_id = ?2 AND is_placeholder = 1
                 ORDER BY created_at ASC, rowid ASC LIMIT 1",
                params![assignment_id, student_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Replace extracted text. Only used for re-extraction of empty text.
    pub fn update_text(conn: &Connection, submission_id: &str, text: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE submissions SET extracted_text = ?1 WHERE id = ?2",
            params![text, submission_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SubmissionRow> {
        Ok(SubmissionRow {
            id: row.get("id")?,
            assignment_id: row.get("assignment_id")?,
            student_id: row.get("student_id")?,
            file_name: row.get("file_name")?,
            blob_id: row.get("blob_id")?,
            extracted_text: row.get("extracted_text")?,
            is_placeholder: get_bool(row, "is_placeholder")?,
            created_at: row.get("created_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
