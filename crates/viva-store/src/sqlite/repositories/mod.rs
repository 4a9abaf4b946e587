//! Stateless repositories. Every method takes `&Connection` and executes SQL;
//! transaction boundaries belong to the caller.

pub mod assignment;
pub mod blob;
pub mod inclusion;
pub mod interaction;
pub mod message;
pub mod resource;
pub mod session;
pub mod submission;

/// Read a `0`/`1` integer column as `bool`.
pub(crate) fn get_bool(row: &rusqlite::Row<'_>, col: &str) -> rusqlite::Result<bool> {
    Ok(row.get::<_, i64>(col)? != 0)
}
