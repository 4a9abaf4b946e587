//! Runtime error types.

use viva_store::StoreError;

/// Errors surfaced by engine operations.
///
/// Upstream language-model failures are deliberately absent: turns and
/// feedback recover from them with fallback text and report a
/// [`TurnStatus::Error`](crate::examiner::TurnStatus) instead.
#[derive(Debug, thiserror::Error)]
pub enum VivaError {
    /// An id did not resolve.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind (`session`, `submission`, ...).
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// The caller does not own the session or submission.
    #[error("forbidden: {user_id} may not access this {kind}")]
    Forbidden {
        /// Entity kind.
        kind: &'static str,
        /// Caller that was rejected.
        user_id: String,
    },

    /// The assignment deadline has passed.
    #[error("assignment deadline has passed")]
    DeadlinePassed,

    /// The student has used every allowed attempt.
    #[error("no attempts remaining (maximum {max_attempts})")]
    NoAttemptsRemaining {
        /// Configured attempt ceiling.
        max_attempts: i64,
    },

    /// Neither a submission nor a resource is selected.
    #[error("nothing selected to examine")]
    NothingSelected,

    /// The session has already ended.
    #[error("session already ended")]
    SessionEnded,

    /// The assignment does not allow toggling inclusion links.
    #[error("inclusion toggles are disabled for this assignment")]
    TogglesDisabled,

    /// A turn carried no text, rating or end signal.
    #[error("message text is empty")]
    EmptyMessage,

    /// Persistence failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Text extraction failed.
    #[error("extraction failed: {message}")]
    Extraction {
        /// Error description.
        message: String,
    },
}

impl VivaError {
    pub(crate) fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub(crate) fn forbidden(kind: &'static str, user_id: &str) -> Self {
        Self::Forbidden {
            kind,
            user_id: user_id.to_string(),
        }
    }

    /// Whether the error rejects a request that breaks a session invariant.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(
            self,
            Self::DeadlinePassed
                | Self::NoAttemptsRemaining { .. }
                | Self::NothingSelected
                | Self::SessionEnded
                | Self::TogglesDisabled
                | Self::EmptyMessage
        )
    }

    /// Error category string for the boundary layer.
    pub fn category(&self) -> &'static str {
        match self {
            Self::NotFound { .. } | Self::Store(StoreError::NotFound { .. }) => "not_found",
            Self::Forbidden { .. } => "forbidden",
            e if e.is_invariant_violation() => "invariant_violation",
            _ => "internal",
        }
    }
}

/// Convenience type alias for runtime results.
pub type Result<T> = std::result::Result<T, VivaError>;
