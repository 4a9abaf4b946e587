//! Integrity flag engine.
//!
//! [`compute_flags`] is a pure function over a session, its filtered event
//! log, its transcript and the assignment's tracking toggles. It performs no
//! I/O and is safe to call concurrently for dashboard rendering. A rule never
//! fires when its toggle is off, whatever the data says.

use chrono::{DateTime, Utc};
use serde_json::Value;
use viva_core::text::char_len;
use viva_core::time::parse_timestamp;
use viva_store::{AssignmentRow, InteractionRow, MessageRow, SessionRow};

/// Focus losses at or above this count raise a flag.
pub const FOCUS_LOSS_THRESHOLD: usize = 3;

/// Pastes longer than this many characters count as large.
pub const LARGE_PASTE_CHARS: usize = 20;

/// Gap between consecutive transcript entries that counts as no response.
pub const RESPONSE_GAP_SECONDS: i64 = 120;

/// Tracking toggles and thresholds that drive the rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntegrityConfig {
    /// Focus, paste, copy and early-end rules.
    pub event_tracking: bool,
    /// Response-gap rule.
    pub keystroke_tracking: bool,
    /// Arrhythmic-typing rule.
    pub arrhythmic_typing: bool,
    /// Anomaly count that raises the arrhythmic-typing flag.
    pub arrhythmic_threshold: u32,
    /// Configured viva length, for the early-end rule.
    pub viva_duration_seconds: i64,
}

impl IntegrityConfig {
    /// Read the toggles from an assignment. A missing or non-positive
    /// assignment threshold falls back to `default_threshold`.
    pub fn for_assignment(assignment: &AssignmentRow, default_threshold: u32) -> Self {
        let arrhythmic_threshold = assignment
            .arrhythmic_threshold
            .and_then(|t| u32::try_from(t).ok())
            .filter(|t| *t > 0)
            .unwrap_or(default_threshold);
        Self {
            event_tracking: assignment.event_tracking,
            keystroke_tracking: assignment.keystroke_tracking,
            arrhythmic_typing: assignment.arrhythmic_typing,
            arrhythmic_threshold,
            viva_duration_seconds: assignment.viva_duration_seconds,
        }
    }
}

/// Select the events belonging to `session`.
///
/// Events tagged with the session id win. When none carry the tag, events
/// timestamped between the session start and its end (or `now` while
/// active) are used instead.
pub fn filter_session_events<'a>(
    session: &SessionRow,
    events: &'a [InteractionRow],
    now: DateTime<Utc>,
) -> Vec<&'a InteractionRow> {
    let tagged: Vec<&InteractionRow> = events
        .iter()
        .filter(|e| e.session_tag() == Some(session.id.as_str()))
        .collect();
    if !tagged.is_empty() {
        return tagged;
    }

    let Some(start) = parse_timestamp(&session.started_at) else {
        return Vec::new();
    };
    let end = session
        .ended_at
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);
    events
        .iter()
        .filter(|e| {
            parse_timestamp(&e.timestamp).is_some_and(|at| at >= start && at <= end)
        })
        .collect()
}

/// Evaluate every enabled rule, in a fixed order.
pub fn compute_flags(
    session: &SessionRow,
    events: &[&InteractionRow],
    messages: &[MessageRow],
    config: &IntegrityConfig,
) -> Vec<String> {
    let mut flags = Vec::new();

    if config.event_tracking {
        let focus_losses = events.iter().filter(|e| is_focus_loss(e)).count();
        if focus_losses >= FOCUS_LOSS_THRESHOLD {
            flags.push(format!("Frequent tab/window switching ({focus_losses}×)."));
        }

        let pastes: Vec<&&InteractionRow> =
            events.iter().filter(|e| e.event_type == "paste").collect();
        if !pastes.is_empty() {
            flags.push(format!("Paste events detected ({}×).", pastes.len()));
            let large = pastes
                .iter()
                .filter(|e| paste_length(&e.event_data) > LARGE_PASTE_CHARS)
                .count();
            match large {
                0 => {}
                1 => flags.push(format!(
                    "Large pasted snippet detected (>{LARGE_PASTE_CHARS} chars)."
                )),
                n => flags.push(format!(
                    "Large pasted snippets detected ({n}×, >{LARGE_PASTE_CHARS} chars)."
                )),
            }
        }

        let copies = events.iter().filter(|e| is_ai_message_copy(e)).count();
        if copies > 0 {
            flags.push(format!("AI message copied ({copies}×)."));
        }

        if ended_early(session, config.viva_duration_seconds) {
            flags.push("Viva ended unusually early (<25% of time).".to_string());
        }
    }

    if config.keystroke_tracking && has_response_gap(messages) {
        flags.push(format!(
            "Long period of no response (>{RESPONSE_GAP_SECONDS}s)."
        ));
    }

    if config.arrhythmic_typing {
        let anomalies = events
            .iter()
            .filter(|e| e.event_type == "arrhythmic_typing")
            .count();
        if anomalies > 0 && anomalies >= config.arrhythmic_threshold as usize {
            flags.push(format!("Arrhythmic typing anomalies ({anomalies}×)."));
        }
    }

    flags
}

fn is_focus_loss(event: &InteractionRow) -> bool {
    match event.event_type.as_str() {
        "blur" => true,
        "visibility" => event.event_data.get("state").and_then(Value::as_str) == Some("hidden"),
        _ => false,
    }
}

/// Reported paste length: numeric `length`, else the length of `text`.
#[allow(clippy::cast_possible_truncation)] // pasted lengths are far below usize::MAX
fn paste_length(data: &Value) -> usize {
    data.get("length")
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .or_else(|| data.get("text").and_then(Value::as_str).map(char_len))
        .unwrap_or(0)
}

fn is_ai_message_copy(event: &InteractionRow) -> bool {
    event.event_type == "copy"
        && match event.event_data.get("target") {
            None | Some(Value::Null) => true,
            Some(target) => target.as_str() == Some("ai_message"),
        }
}

fn ended_early(session: &SessionRow, viva_duration_seconds: i64) -> bool {
    match (session.ended_at.as_ref(), session.duration_seconds) {
        (Some(_), Some(duration)) if viva_duration_seconds > 0 => {
            duration.saturating_mul(4) < viva_duration_seconds
        }
        _ => false,
    }
}

fn has_response_gap(messages: &[MessageRow]) -> bool {
    let times: Vec<DateTime<Utc>> = messages
        .iter()
        .filter_map(|m| parse_timestamp(&m.timestamp))
        .collect();
    times
        .windows(2)
        .any(|pair| (pair[1] - pair[0]).num_seconds() > RESPONSE_GAP_SECONDS)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
