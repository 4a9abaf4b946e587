//! Transcript repository.
//!
//! Messages are append-only. Each insert takes the next per-session
//! sequence number, so transcript order is insertion order regardless of
//! clock resolution.

use rusqlite::{Connection, params};
use viva_core::ids::MessageId;

use crate::errors::Result;
use crate::sqlite::row_types::{MessageRow, MessageSender};

/// Message repository — stateless, every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Append a message. Call inside a transaction so the sequence read and
    /// the insert are atomic.
    pub fn append(
        conn: &Connection,
        session_id: &str,
        sender: MessageSender,
        text: &str,
        model_answer: Option<&str>,
        timestamp: &str,
    ) -> Result<MessageRow> {
        let sequence: i64 = conn.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM viva_messages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        let id = MessageId::new().into_inner();
        let _ = conn.execute(
            "INSERT INTO viva_messages (id, session_id, sequence, sender, text, model_answer, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![id, session_id, sequence, sender.as_str(), text, model_answer, timestamp],
        )?;
        Ok(MessageRow {
            id,
            session_id: session_id.to_string(),
            sequence,
            sender,
            text: text.to_string(),
            model_answer: model_answer.map(String::from),
            timestamp: timestamp.to_string(),
        })
    }

    /// Full transcript in order.
    pub fn list(conn: &Connection, session_id: &str) -> Result<Vec<MessageRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM viva_messages WHERE session_id = ?1 ORDER BY sequence ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
        let sender: String = row.get("sender")?;
        Ok(MessageRow {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            sequence: row.get("sequence")?,
            sender: MessageSender::from_db(&sender),
            text: row.get("text")?,
            model_answer: row.get("model_answer")?,
            timestamp: row.get("timestamp")?,
        })
    }
}
