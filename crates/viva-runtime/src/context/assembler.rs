//! Character-budgeted context assembly.
//!
//! Included resources come first, then included submissions, each group in
//! creation order. Every source contributes at most the per-source cap or
//! whatever remains of the global budget, whichever is smaller. A source
//! that had to be cut carries [`TRUNCATION_SUFFIX`]; the suffix is not
//! charged against either budget. Sources without text are skipped.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use viva_core::text::{char_len, truncate_with_suffix};
use viva_settings::ContextSettings;
use viva_store::{InclusionKind, InclusionRow, SessionRow, VivaStore};

use crate::errors::Result;

/// Marker appended to a source that was cut to fit.
pub const TRUNCATION_SUFFIX: &str = "\n[...truncated]";

/// Separator between sources.
const SOURCE_SEPARATOR: &str = "\n\n";

/// Character limits for one assembly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContextBudget {
    /// Budget across all sources.
    pub max_total_chars: usize,
    /// Cap for any single source.
    pub max_source_chars: usize,
}

impl From<&ContextSettings> for ContextBudget {
    fn from(settings: &ContextSettings) -> Self {
        Self {
            max_total_chars: settings.max_total_chars,
            max_source_chars: settings.max_source_chars,
        }
    }
}

/// Where a source came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Instructor resource.
    Resource,
    /// Student submission.
    Submission,
}

/// One piece of material eligible for the context.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextSource {
    /// Origin.
    pub kind: SourceKind,
    /// Resource or submission id.
    pub id: String,
    /// Extracted text.
    pub text: String,
}

/// Assemble `sources` into one bounded blob.
///
/// Resources are always emitted before submissions; within a kind the input
/// order is kept.
pub fn assemble(sources: &[ContextSource], budget: ContextBudget) -> String {
    let ordered = sources
        .iter()
        .filter(|s| s.kind == SourceKind::Resource)
        .chain(sources.iter().filter(|s| s.kind == SourceKind::Submission));

    let mut remaining = budget.max_total_chars;
    let mut parts: Vec<String> = Vec::new();
    for source in ordered {
        if source.text.trim().is_empty() {
            continue;
        }
        if remaining == 0 {
            break;
        }
        let cap = budget.max_source_chars.min(remaining);
        parts.push(truncate_with_suffix(&source.text, cap, TRUNCATION_SUFFIX));
        remaining -= char_len(&source.text).min(cap);
    }
    parts.join(SOURCE_SEPARATOR)
}

/// Collect the sources in scope for a session, in assembly order.
///
/// Resources follow their session links; a session with no resource links
/// at all falls back to each resource's assignment-level default, and a
/// resource without a link of its own does the same. Submissions follow
/// their links; a session with no submission links uses its anchoring
/// submission alone.
pub fn load_sources(store: &VivaStore, session: &SessionRow) -> Result<Vec<ContextSource>> {
    let mut sources = Vec::new();

    let resource_links = link_map(store.list_inclusions(&session.id, InclusionKind::Resource)?);
    for resource in store.list_resources(&session.assignment_id)? {
        let included = resource_links
            .get(&resource.id)
            .copied()
            .unwrap_or(resource.included);
        if included {
            sources.push(ContextSource {
                kind: SourceKind::Resource,
                id: resource.id,
                text: resource.extracted_text,
            });
        }
    }

    let submission_links = store.list_inclusions(&session.id, InclusionKind::Submission)?;
    if submission_links.is_empty() {
        if let Some(anchor) = store.get_submission(&session.submission_id)? {
            sources.push(ContextSource {
                kind: SourceKind::Submission,
                id: anchor.id,
                text: anchor.extracted_text,
            });
        }
    } else {
        let links = link_map(submission_links);
        for submission in
            store.list_student_submissions(&session.assignment_id, &session.student_id, true)?
        {
            if links.get(&submission.id).copied().unwrap_or(false) {
                sources.push(ContextSource {
                    kind: SourceKind::Submission,
                    id: submission.id,
                    text: submission.extracted_text,
                });
            }
        }
    }

    Ok(sources)
}

fn link_map(rows: Vec<InclusionRow>) -> HashMap<String, bool> {
    rows.into_iter().map(|r| (r.target_id, r.included)).collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
