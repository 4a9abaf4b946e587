//! # viva-core
//!
//! Foundation types shared by every viva crate:
//!
//! - **Branded IDs**: `AssignmentId`, `SubmissionId`, `ResourceId`, `SessionId`,
//!   `MessageId` as prefixed newtypes for type safety
//! - **Identity**: [`identity::Caller`] with role resolution from LTI-style role labels
//! - **Text**: char-boundary-safe truncation helpers
//! - **Time**: RFC 3339 timestamp formatting and parsing
//! - **Logging**: `tracing` subscriber initialization

#![deny(unsafe_code)]

pub mod constants;
pub mod identity;
pub mod ids;
pub mod logging;
pub mod text;
pub mod time;
