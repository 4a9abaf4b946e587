//! High-level store facade.

mod viva_store;

pub use crate::sqlite::repositories::assignment::NewAssignment;
pub use crate::sqlite::repositories::inclusion::{InclusionKind, MaterializeMode};
pub use crate::sqlite::repositories::resource::NewResource;
pub use crate::sqlite::repositories::submission::NewSubmission;
pub use viva_store::{
    InclusionEntry, NewInteraction, OpenSession, OpenSessionOutcome, ToggleOutcome, VivaStore,
};
