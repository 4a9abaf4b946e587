//! Assignment repository.
//!
//! Assignments are edited outside the engine; this repository covers what the
//! engine and its tests need: create, read, and keeping the boolean feedback
//! visibility flags in sync with the legacy label.

use rusqlite::{Connection, OptionalExtension, params};
use viva_core::ids::AssignmentId;
use viva_core::time::now_timestamp;

use super::get_bool;
use crate::errors::Result;
use crate::sqlite::row_types::AssignmentRow;

/// Fields for a new assignment.
#[derive(Clone, Debug)]
pub struct NewAssignment {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Viva length in seconds.
    pub viva_duration_seconds: i64,
    /// Attempt ceiling; `0` means unlimited.
    pub max_attempts: i64,
    /// Optional deadline (RFC 3339).
    pub deadline_at: Option<String>,
    /// Examiner tone label.
    pub viva_tone: String,
    /// Viva instructions.
    pub viva_instructions: String,
    /// Additional prompts.
    pub additional_prompts: String,
    /// Event tracking gate.
    pub event_tracking: bool,
    /// Keystroke tracking gate.
    pub keystroke_tracking: bool,
    /// Arrhythmic typing gate.
    pub arrhythmic_typing: bool,
    /// Arrhythmic typing threshold override.
    pub arrhythmic_threshold: Option<i64>,
    /// Whether inclusion toggles are allowed.
    pub inclusion_toggles_enabled: bool,
    /// Legacy visibility label (`immediate`, `after_review`, `hidden`).
    pub feedback_visibility: String,
}

impl Default for NewAssignment {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            viva_duration_seconds: 600,
            max_attempts: 1,
            deadline_at: None,
            viva_tone: "Supportive".to_string(),
            viva_instructions: String::new(),
            additional_prompts: String::new(),
            event_tracking: true,
            keystroke_tracking: true,
            arrhythmic_typing: true,
            arrhythmic_threshold: None,
            inclusion_toggles_enabled: true,
            feedback_visibility: "immediate".to_string(),
        }
    }
}

/// Resolve a legacy visibility label into `(ai_visible, teacher_visible)`.
pub fn resolve_feedback_visibility(label: &str) -> (bool, bool) {
    match label {
        "hidden" => (false, false),
        "after_review" => (false, true),
        _ => (true, true),
    }
}

/// Assignment repository — stateless, every method takes `&Connection`.
pub struct AssignmentRepo;

impl AssignmentRepo {
    /// Insert an assignment.
    pub fn create(conn: &Connection, new: &NewAssignment) -> Result<AssignmentRow> {
        let id = AssignmentId::new().into_inner();
        let now = now_timestamp();
        let (ai_visible, teacher_visible) = resolve_feedback_visibility(&new.feedback_visibility);

        let _ = conn.execute(
            "INSERT INTO assignments (id, title, description, viva_duration_seconds, max_attempts,
             deadline_at, viva_tone, viva_instructions, additional_prompts, event_tracking,
             keystroke_tracking, arrhythmic_typing, arrhythmic_threshold, inclusion_toggles_enabled,
             feedback_visibility, ai_feedback_visible, teacher_feedback_visible, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            params![
                id,
                new.title,
                new.description,
                new.viva_duration_seconds,
                new.max_attempts,
                new.deadline_at,
                new.viva_tone,
                new.viva_instructions,
                new.additional_prompts,
                new.event_tracking,
                new.keystroke_tracking,
                new.arrhythmic_typing,
                new.arrhythmic_threshold,
                new.inclusion_toggles_enabled,
                new.feedback_visibility,
                ai_visible,
                teacher_visible,
                now,
            ],
        )?;

        Ok(AssignmentRow {
            id,
            title: new.title.clone(),
            description: new.description.clone(),
            viva_duration_seconds: new.viva_duration_seconds,
            max_attempts: new.max_attempts,
            deadline_at: new.deadline_at.clone(),
            viva_tone: new.viva_tone.clone(),
            viva_instructions: new.viva_instructions.clone(),
            additional_prompts: new.additional_prompts.clone(),
            event_tracking: new.event_tracking,
            keystroke_tracking: new.keystroke_tracking,
            arrhythmic_typing: new.arrhythmic_typing,
            arrhythmic_threshold: new.arrhythmic_threshold,
            inclusion_toggles_enabled: new.inclusion_toggles_enabled,
            feedback_visibility: new.feedback_visibility.clone(),
            ai_feedback_visible: ai_visible,
            teacher_feedback_visible: teacher_visible,
            created_at: now,
        })
    }

    /// Get an assignment by ID.
    pub fn get_by_id(conn: &Connection, assignment_id: &str) -> Result<Option<AssignmentRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM assignments WHERE id = ?1",
                params![assignment_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Set the legacy visibility label and the boolean flags it implies.
    pub fn set_feedback_visibility(conn: &Connection, assignment_id: &str, label: &str) -> Result<bool> {
        let (ai_visible, teacher_visible) = resolve_feedback_visibility(label);
        let changed = conn.execute(
            "UPDATE assignments SET feedback_visibility = ?1, ai_feedback_visible = ?2,
             teacher_feedback_visible = ?3 WHERE id = ?4",
            params![label, ai_visible, teacher_visible, assignment_id],
        )?;
        Ok(changed > 0)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssignmentRow> {
        Ok(AssignmentRow {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            viva_duration_seconds: row.get("viva_duration_seconds")?,
            max_attempts: row.get("max_attempts")?,
            deadline_at: row.get("deadline_at")?,
            viva_tone: row.get("viva_tone")?,
            viva_instructions: row.get("viva_instructions")?,
            additional_prompts: row.get("additional_prompts")?,
            event_tracking: get_bool(row, "event_tracking")?,
            keystroke_tracking: get_bool(row, "keystroke_tracking")?,
            arrhythmic_typing: get_bool(row, "arrhythmic_typing")?,
            arrhythmic_threshold: row.get("arrhythmic_threshold")?,
            inclusion_toggles_enabled: get_bool(row, "inclusion_toggles_enabled")?,
            feedback_visibility: row.get("feedback_visibility")?,
            ai_feedback_visible: get_bool(row, "ai_feedback_visible")?,
            teacher_feedback_visible: get_bool(row, "teacher_feedback_visible")?,
            created_at: row.get("created_at")?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
