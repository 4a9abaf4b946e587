//! Assignment resource repository.

use rusqlite::{Connection, OptionalExtension, params};
use viva_core::ids::ResourceId;
use viva_core::time::now_timestamp;

use super::get_bool;
use crate::errors::Result;
use crate::sqlite::row_types::ResourceRow;

/// Fields for a new resource.
#[derive(Clone, Debug)]
pub struct NewResource {
    /// Owning assignment.
    pub assignment_id: String,
    /// File name.
    pub file_name: String,
    /// Stored bytes.
    pub blob_id: Option<String>,
    /// Extracted text.
    pub extracted_text: String,
    /// Assignment-wide default inclusion.
    pub included: bool,
}

impl Default for NewResource {
    fn default() -> Self {
        Self {
            assignment_id: String::new(),
            file_name: String::new(),
            blob_id: None,
            extracted_text: String::new(),
            included: true,
        }
    }
}

/// Resource repository — stateless, every method takes `&Connection`.
pub struct ResourceRepo;

impl ResourceRepo {
    /// Insert a resource.
    pub fn create(conn: &Connection, new: &NewResource) -> Result<ResourceRow> {
        let id = ResourceId::new().into_inner();
        let now = now_timestamp();
        let _ = conn.execute(
            "INSERT INTO assignment_resources (id, assignment_id, file_name, blob_id,
             extracted_text, included, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                new.assignment_id,
                new.file_name,
                new.blob_id,
                new.extracted_text,
                new.included,
                now,
            ],
        )?;
        Ok(ResourceRow {
            id,
            assignment_id: new.assignment_id.clone(),
            file_name: new.file_name.clone(),
            blob_id: new.blob_id.clone(),
            extracted_text: new.extracted_text.clone(),
            included: new.included,
            created_at: now,
        })
    }

    /// Get a resource by ID.
    pub fn get_by_id(conn: &Connection, resource_id: &str) -> Result<Option<ResourceRow>> {
        let row = conn
            .query_row(
                "SELECT * FROM assignment_resources WHERE id = ?1",
                params![resource_id],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All resources of an assignment, in creation order.
    pub fn list_for_assignment(conn: &Connection, assignment_id: &str) -> Result<Vec<ResourceRow>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM assignment_resources WHERE assignment_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![assignment_id], Self::map_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ResourceRow> {
        Ok(ResourceRow {
            id: row.get("id")?,
            assignment_id: row.get("assignment_id")?,
            file_name: row.get("file_name")?,
            blob_id: row.get("blob_id")?,
            extracted_text: row.get("extracted_text")?,
            included: get_bool(row, "included")?,
            created_at: row.get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::repositories::test_support::{assignment, migrated};

    #[test]
    fn list_in_creation_order() {
        let conn = migrated();
        let a = assignment(&conn);
        let mk = |name: &str, included: bool| {
            ResourceRepo::create(
                &conn,
                &NewResource {
                    assignment_id: a.id.clone(),
                    file_name: name.into(),
                    extracted_text: format!("{name} text"),
                    included,
                    ..NewResource::default()
                },
            )
            .unwrap()
        };
        let r1 = mk("rubric.txt", true);
        let r2 = mk("notes.txt", false);

        let listed = ResourceRepo::list_for_assignment(&conn, &a.id).unwrap();
        assert_eq!(listed, vec![r1.clone(), r2]);
        assert_eq!(ResourceRepo::get_by_id(&conn, &r1.id).unwrap(), Some(r1));
    }
}
