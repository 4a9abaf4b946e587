//! Caller identity and role resolution.
//!
//! The launch handshake that authenticates a caller lives outside the engine.
//! What reaches the engine is a user id plus the raw role labels the platform
//! asserted (LTI role URIs such as
//! `http://purl.imsglobal.org/vocab/lis/v2/membership#Instructor`), which are
//! resolved here into a small [`Role`] set.

use serde::{Deserialize, Serialize};

/// Label fragments that mark a teaching role.
const INSTRUCTOR_KEYWORDS: &[&str] = &[
    "Instructor",
    "ContentDeveloper",
    "TeachingAssistant",
    "CourseDesigner",
];

/// Label fragments that mark an administrative role.
const ADMIN_KEYWORDS: &[&str] = &["Administrator", "SysAdmin"];

/// Resolved role of a caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Takes vivas on their own submissions.
    Student,
    /// Reviews sessions, writes teacher feedback.
    Instructor,
    /// Platform administrator; has every instructor capability.
    Admin,
}

/// Resolve raw role labels into roles.
///
/// A label may match several keywords; each role appears at most once.
/// Callers with no recognized teaching or admin label are students.
pub fn resolve_roles<S: AsRef<str>>(labels: &[S]) -> Vec<Role> {
    let mut roles = Vec::new();
    let has = |keywords: &[&str]| {
        labels
            .iter()
            .any(|label| keywords.iter().any(|k| label.as_ref().contains(k)))
    };
    if has(ADMIN_KEYWORDS) {
        roles.push(Role::Admin);
    }
    if has(INSTRUCTOR_KEYWORDS) {
        roles.push(Role::Instructor);
    }
    if roles.is_empty() {
        roles.push(Role::Student);
    }
    roles
}

/// The identity on whose behalf an engine operation runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    /// Platform user id (LTI `sub`).
    pub user_id: String,
    /// Resolved roles.
    pub roles: Vec<Role>,
}

impl Caller {
    /// A caller with only the student role.
    pub fn student(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: vec![Role::Student],
        }
    }

    /// A caller with the instructor role.
    pub fn instructor(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            roles: vec![Role::Instructor],
        }
    }

    /// Build a caller from raw platform role labels.
    pub fn from_role_labels<S: AsRef<str>>(user_id: impl Into<String>, labels: &[S]) -> Self {
        Self {
            user_id: user_id.into(),
            roles: resolve_roles(labels),
        }
    }

    /// Whether the caller may review other students' sessions.
    pub fn is_instructor(&self) -> bool {
        self.roles
            .iter()
            .any(|r| matches!(r, Role::Instructor | Role::Admin))
    }

    /// Whether the caller is a platform administrator.
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// Whether `owner_id` is this caller.
    pub fn owns(&self, owner_id: &str) -> bool {
        self.user_id == owner_id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
