//! Blob repository — content-addressable byte storage with SHA-256 dedup.
//!
//! Saving identical bytes twice returns the existing blob id.

use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use viva_core::ids::BlobId;
use viva_core::time::now_timestamp;

use crate::errors::Result;
use crate::sqlite::row_types::BlobRow;

/// Blob repository — stateless, every method takes `&Connection`.
pub struct BlobRepo;

impl BlobRepo {
    /// Store content under `name`, deduplicating by hash. Returns the blob id.
    pub fn store(conn: &Connection, name: &str, content: &[u8]) -> Result<String> {
        let hash = hex_sha256(content);

        let existing: Option<String> = conn
            .query_row(
                "SELECT id FROM blobs WHERE hash = ?1",
                params![hash],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }

        let id = BlobId::new().into_inner();
        let size = i64::try_from(content.len()).unwrap_or(i64::MAX);
        let _ = conn.execute(
            "INSERT INTO blobs (id, name, hash, content, size, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![id, name, hash, content, size, now_timestamp()],
        )?;
        Ok(id)
    }

    /// Blob content by ID.
    pub fn get_content(conn: &Connection, blob_id: &str) -> Result<Option<Vec<u8>>> {
        let content = conn
            .query_row(
                "SELECT content FROM blobs WHERE id = ?1",
                params![blob_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(content)
    }

    /// Blob metadata by ID.
    pub fn get_by_id(conn: &Connection, blob_id: &str) -> Result<Option<BlobRow>> {
        let row = conn
            .query_row(
                "SELECT id, name, hash, size, created_at FROM blobs WHERE id = ?1",
                params![blob_id],
                |row| {
                    Ok(BlobRow {
                        id: row.get("id")?,
                        name: row.get("name")?,
                        hash: row.get("hash")?,
                        size: row.get("size")?,
                        created_at: row.get("created_at")?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}

fn hex_sha256(content: &[u8]) -> String {
    use std::fmt::Write;
    let digest = Sha256::digest(content);
    digest.iter().fold(String::with_capacity(64), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::repositories::test_support::migrated;

    #[test]
    fn store_and_load() {
        let conn = migrated();
        let id = BlobRepo::store(&conn, "essay.txt", b"hello").unwrap();
        assert!(id.starts_with("blob_"));
        assert_eq!(BlobRepo::get_content(&conn, &id).unwrap(), Some(b"hello".to_vec()));

        let meta = BlobRepo::get_by_id(&conn, &id).unwrap().unwrap();
        assert_eq!(meta.name, "essay.txt");
        assert_eq!(meta.size, 5);
        assert_eq!(
            meta.hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn identical_content_is_deduplicated() {
        let conn = migrated();
        let a = BlobRepo::store(&conn, "a.txt", b"same").unwrap();
        let b = BlobRepo::store(&conn, "b.txt", b"same").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_blob_is_none() {
        let conn = migrated();
        assert!(BlobRepo::get_content(&conn, "blob_missing").unwrap().is_none());
    }
}
