//! # viva-store
//!
//! `SQLite` persistence for the viva engine.
//!
//! - **[`sqlite`]**: connection pool, embedded migrations, row types and
//!   stateless repositories (every method takes `&Connection`).
//! - **[`store`]**: [`VivaStore`], the transactional facade the runtime uses.
//!   Each facade method checks out one pooled connection, runs to completion
//!   and returns owned rows, so no connection is ever held across an `.await`.

#![deny(unsafe_code)]

pub mod errors;
pub mod sqlite;
pub mod store;

pub use errors::{Result, StoreError};
pub use sqlite::connection::{ConnectionConfig, ConnectionPool};
pub use sqlite::row_types::*;
pub use store::{
    InclusionEntry, InclusionKind, MaterializeMode, NewAssignment, NewInteraction, NewResource,
    NewSubmission, OpenSession, OpenSessionOutcome, ToggleOutcome, VivaStore,
};
