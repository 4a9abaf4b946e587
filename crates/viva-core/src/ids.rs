//! Branded ID newtypes for type safety.
//!
//! Every persisted viva entity has a distinct ID type wrapping a `String`
//! of the form `<prefix>_<uuid-v7>`. The prefix makes ids recognizable in
//! logs and keeps a submission id from being passed where a session id is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Prefix carried by freshly generated ids of this kind.
            pub const PREFIX: &'static str = $prefix;

            /// Create a new time-ordered ID.
            #[must_use]
            pub fn new() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::now_v7()))
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for an assignment.
    AssignmentId, "asgn"
}

branded_id! {
    /// Unique identifier for a student submission.
    SubmissionId, "subm"
}

branded_id! {
    /// Unique identifier for an instructor-provided assignment resource.
    ResourceId, "rsrc"
}

branded_id! {
    /// Unique identifier for a viva session.
    SessionId, "viva"
}

branded_id! {
    /// Unique identifier for a transcript message.
    MessageId, "vmsg"
}

branded_id! {
    /// Unique identifier for an interaction log entry.
    InteractionId, "ilog"
}

branded_id! {
    /// Unique identifier for a stored blob.
    BlobId, "blob"
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_carries_prefix_and_uuid_v7() {
        let id = SessionId::new();
        let (prefix, raw) = id.as_str().split_once('_').expect("prefixed id");
        assert_eq!(prefix, "viva");
        let parsed = Uuid::parse_str(raw).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn prefixes_are_distinct() {
        let prefixes = [
            AssignmentId::PREFIX,
            SubmissionId::PREFIX,
            ResourceId::PREFIX,
            SessionId::PREFIX,
            MessageId::PREFIX,
            InteractionId::PREFIX,
            BlobId::PREFIX,
        ];
        let unique: std::collections::HashSet<_> = prefixes.iter().collect();
        assert_eq!(unique.len(), prefixes.len());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(SubmissionId::new(), SubmissionId::new());
    }

    #[test]
    fn from_str_ref_and_deref() {
        let id = SessionId::from("viva_abc");
        let s: &str = &id;
        assert_eq!(s, "viva_abc");
        assert_eq!(format!("{id}"), "viva_abc");
    }

    #[test]
    fn serde_is_transparent() {
        let id = ResourceId::from("rsrc_1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"rsrc_1\"");
        let back: ResourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn into_inner() {
        let id = AssignmentId::from("asgn_x");
        assert_eq!(id.into_inner(), "asgn_x");
    }
}
