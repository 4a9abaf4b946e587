//! Interaction log repository (append-only behavioral events).

use rusqlite::{Connection, params};
use serde_json::Value;
use viva_core::ids::InteractionId;

use crate::errors::Result;
use crate::sqlite::row_types::InteractionRow;

/// Interaction log repository — stateless, every method takes `&Connection`.
pub struct InteractionRepo;

impl InteractionRepo {
    /// Append one event.
    pub fn append(
        conn: &Connection,
        submission_id: &str,
        event_type: &str,
        event_data: &Value,
        timestamp: &str,
    ) -> Result<InteractionRow> {
        let id = InteractionId::new().into_inner();
        let _ = conn.execute(
            "INSERT INTO interaction_logs (id, submission_id, event_type, event_data, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, submission_id, event_type, event_data, timestamp],
        )?;
        Ok(InteractionRow {
            id,
            submission_id: submission_id.to_string(),
            event_type: event_type.to_string(),
            event_data: event_data.clone(),
            timestamp: timestamp.to_string(),
        })
    }

    /// All events logged against a submission, oldest first.
    pub fn list_for_submission(conn: &Connection, submission_id: &str) -> Result<Vec<InteractionRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM interaction_logs WHERE submission_id = ?1
             ORDER BY timestamp ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![submission_id], |row| {
                Ok(InteractionRow {
                    id: row.get("id")?,
                    submission_id: row.get("submission_id")?,
                    event_type: row.get("event_type")?,
                    event_data: row.get("event_data")?,
                    timestamp: row.get("timestamp")?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
