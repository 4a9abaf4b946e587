//! Inclusion link repository.
//!
//! A link decides whether a submission or resource is in scope for one
//! session. Links are keyed by `(session_id, target_id)`, so materializing
//! them is an upsert and concurrent starts cannot create duplicates.

use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::sqlite::row_types::InclusionRow;

/// Which kind of material a link points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InclusionKind {
    /// A student submission.
    Submission,
    /// An assignment resource.
    Resource,
}

impl InclusionKind {
    fn link_table(self) -> &'static str {
        match self {
            Self::Submission => "viva_session_submissions",
            Self::Resource => "viva_session_resources",
        }
    }

    fn target_column(self) -> &'static str {
        match self {
            Self::Submission => "submission_id",
            Self::Resource => "resource_id",
        }
    }

    fn target_table(self) -> &'static str {
        match self {
            Self::Submission => "submissions",
            Self::Resource => "assignment_resources",
        }
    }
}

/// How an upsert treats an existing link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MaterializeMode {
    /// Replace the existing flag.
    Overwrite,
    /// Leave an existing link untouched; only insert missing ones.
    KeepExisting,
}

/// Inclusion repository — stateless, every method takes `&Connection`.
pub struct InclusionRepo;

impl InclusionRepo {
    /// Insert or update one link.
    pub fn upsert(
        conn: &Connection,
        session_id: &str,
        kind: InclusionKind,
        target_id: &str,
        included: bool,
        mode: MaterializeMode,
    ) -> Result<()> {
        let conflict = match mode {
            MaterializeMode::Overwrite => "DO UPDATE SET included = excluded.included",
            MaterializeMode::KeepExisting => "DO NOTHING",
        };
        let sql = format!(
            "INSERT INTO {table} (session_id, {col}, included) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id, {col}) {conflict}",
            table = kind.link_table(),
            col = kind.target_column(),
        );
        let _ = conn.execute(&sql, params![session_id, target_id, included])?;
        Ok(())
    }

    /// Current flag for one link.
    pub fn get(
        conn: &Connection,
        session_id: &str,
        kind: InclusionKind,
        target_id: &str,
    ) -> Result<Option<bool>> {
        let sql = format!(
            "SELECT included FROM {table} WHERE session_id = ?1 AND {col} = ?2",
            table = kind.link_table(),
            col = kind.target_column(),
        );
        let included = conn
            .query_row(&sql, params![session_id, target_id], |row| {
                Ok(row.get::<_, i64>(0)? != 0)
            })
            .optional()?;
        Ok(included)
    }

    /// All links of one kind, ordered by the target's creation order.
    pub fn list(conn: &Connection, session_id: &str, kind: InclusionKind) -> Result<Vec<InclusionRow>> {
        let sql = format!(
            "SELECT l.{col} AS target_id, l.included AS included
             FROM {table} l JOIN {target} t ON t.id = l.{col}
             WHERE l.session_id = ?1
             ORDER BY t.created_at ASC, t.rowid ASC",
            table = kind.link_table(),
            col = kind.target_column(),
            target = kind.target_table(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok(InclusionRow {
                    target_id: row.get("target_id")?,
                    included: row.get::<_, i64>("included")? != 0,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
