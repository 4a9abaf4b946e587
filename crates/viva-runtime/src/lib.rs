//! # viva-runtime
//!
//! The viva engine: everything between a student pressing "start" and an
//! instructor reading the integrity flags.
//!
//! - **[`context`]**: character-budgeted context assembly and prompt building
//! - **[`examiner`]**: reply parsing and the examiner turn (question plus
//!   model answer, with fallbacks so a turn always completes)
//! - **[`feedback`]**: one-shot end-of-session feedback generation
//! - **[`integrity`]**: pure integrity-flag rules over the event log
//! - **[`events`]**: normalization and gating of behavioral event payloads
//! - **[`submissions`]**: submission intake behind extractor and blob traits
//! - **[`service`]**: [`VivaService`], the session state machine and the
//!   boundary operations built on it
//!
//! The language model is injected as `Arc<dyn ChatProvider>` and all state
//! lives in the [`VivaStore`](viva_store::VivaStore).

#![deny(unsafe_code)]

pub mod context;
pub mod errors;
pub mod events;
pub mod examiner;
pub mod feedback;
pub mod integrity;
pub mod service;
pub mod submissions;

#[cfg(test)]
mod testutil;

pub use errors::{Result, VivaError};
pub use events::{EventBatch, LogOutcome, RawEvent};
pub use examiner::TurnStatus;
pub use service::{
    EndOutcome, FeedbackView, InclusionState, SenderKind, StartRequest, StartedSession,
    TranscriptEntry, TurnOutcome, TurnRequest, VivaService,
};
pub use submissions::{BlobStore, PlainTextExtractor, SqliteBlobStore, SubmissionIntake, TextExtractor};
