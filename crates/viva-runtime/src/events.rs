//! Behavioral event intake.
//!
//! Clients post either a batch (`{"events": [...]}`) or a single legacy
//! event (`{"eventType", "eventData"}`). Both shapes are normalized into one
//! list here, so the event log and the flag engine only ever see
//! `(event_type, sanitized payload)` pairs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use viva_core::text::truncate_chars;
use viva_store::{AssignmentRow, NewInteraction};

/// One client-reported event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Event type (`blur`, `paste`, ...).
    #[serde(alias = "event_type")]
    pub event_type: String,
    /// Arbitrary payload.
    #[serde(default, alias = "event_data")]
    pub event_data: Value,
}

/// Boundary payload of a log-events call.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EventBatch {
    /// `{"events": [...]}`.
    Batch {
        /// Events in client order.
        events: Vec<RawEvent>,
    },
    /// A single legacy event.
    Single(RawEvent),
}

impl EventBatch {
    /// Flatten into a list, preserving order.
    pub fn into_events(self) -> Vec<RawEvent> {
        match self {
            Self::Batch { events } => events,
            Self::Single(event) => vec![event],
        }
    }
}

impl From<Vec<RawEvent>> for EventBatch {
    fn from(events: Vec<RawEvent>) -> Self {
        Self::Batch { events }
    }
}

/// Result of a log-events call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogOutcome {
    /// Events persisted.
    pub logged: usize,
    /// Events dropped by vocabulary gating or because the session ended.
    pub ignored: usize,
}

/// Whether `event_type` is in the assignment's enabled vocabulary.
pub fn is_enabled(event_type: &str, assignment: &AssignmentRow) -> bool {
    match event_type {
        "blur" | "focus" | "visibility" | "paste" | "copy" => assignment.event_tracking,
        "typing_cadence" => assignment.keystroke_tracking,
        "arrhythmic_typing" => assignment.arrhythmic_typing,
        _ => false,
    }
}

/// Sanitize a payload: wrap non-objects as `{"value": ...}`, cap every
/// string at `string_cap` characters and tag it with `session_id`.
pub fn sanitize_payload(data: Value, session_id: &str, string_cap: usize) -> Value {
    let mut object = match cap_strings(data, string_cap) {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            let _ = map.insert("value".to_string(), other);
            map
        }
    };
    let _ = object.insert("session_id".to_string(), Value::String(session_id.to_string()));
    Value::Object(object)
}

fn cap_strings(value: Value, cap: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_chars(&s, cap).to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(|v| cap_strings(v, cap)).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, cap_strings(v, cap)))
                .collect(),
        ),
        other => other,
    }
}

/// Gate and sanitize a batch for one session.
///
/// Returns the events to persist and how many were dropped.
pub fn normalize(
    batch: EventBatch,
    assignment: &AssignmentRow,
    session_id: &str,
    string_cap: usize,
) -> (Vec<NewInteraction>, usize) {
    let mut accepted = Vec::new();
    let mut ignored = 0;
    for event in batch.into_events() {
        let event_type = event.event_type.trim();
        if !is_enabled(event_type, assignment) {
            ignored += 1;
            continue;
        }
        accepted.push(NewInteraction {
            event_type: event_type.to_string(),
            event_data: sanitize_payload(event.event_data, session_id, string_cap),
        });
    }
    (accepted, ignored)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assignment(event_tracking: bool, keystroke: bool, arrhythmic: bool) -> AssignmentRow {
        serde_json::from_value(json!({
            "id": "asgn_1", "title": "T", "description": "", "viva_duration_seconds": 600,
            "max_attempts": 1, "deadline_at": null, "viva_tone": "Neutral",
            "viva_instructions": "", "additional_prompts": "", "event_tracking": event_tracking,
            "keystroke_tracking": keystroke, "arrhythmic_typing": arrhythmic,
            "arrhythmic_threshold": null, "inclusion_toggles_enabled": true,
            "feedback_visibility": "immediate", "ai_feedback_visible": true,
            "teacher_feedback_visible": true, "created_at": "2025-01-01T00:00:00.000000Z"
        }))
        .unwrap()
    }

    #[test]
    fn batch_shape_parses() {
        let batch: EventBatch = serde_json::from_value(json!({
            "events": [
                {"eventType": "blur", "eventData": {}},
                {"eventType": "paste", "eventData": {"length": 4}}
            ]
        }))
        .unwrap();
        assert_eq!(batch.into_events().len(), 2);
    }

    #[test]
    fn legacy_single_shape_parses() {
        let batch: EventBatch =
            serde_json::from_value(json!({"event_type": "copy", "event_data": {"target": "ai_message"}}))
                .unwrap();
        let events = batch.into_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "copy");
        assert_eq!(events[0].event_data["target"], "ai_message");
    }

    #[test]
    fn missing_event_data_defaults_to_null() {
        let batch: EventBatch = serde_json::from_value(json!({"eventType": "blur"})).unwrap();
        assert_eq!(batch.into_events()[0].event_data, Value::Null);
    }

    #[test]
    fn vocabulary_follows_toggles() {
        let only_events = assignment(true, false, false);
        assert!(is_enabled("blur", &only_events));
        assert!(is_enabled("copy", &only_events));
        assert!(!is_enabled("typing_cadence", &only_events));
        assert!(!is_enabled("arrhythmic_typing", &only_events));
        assert!(!is_enabled("keylogger", &only_events));

        let only_typing = assignment(false, true, true);
        assert!(!is_enabled("paste", &only_typing));
        assert!(is_enabled("typing_cadence", &only_typing));
        assert!(is_enabled("arrhythmic_typing", &only_typing));
    }

    #[test]
    fn sanitize_wraps_scalars_and_tags_session() {
        let out = sanitize_payload(json!("hidden"), "viva_1", 500);
        assert_eq!(out, json!({"value": "hidden", "session_id": "viva_1"}));
        let out = sanitize_payload(Value::Null, "viva_1", 500);
        assert_eq!(out, json!({"session_id": "viva_1"}));
    }

    #[test]
    fn sanitize_caps_nested_strings() {
        let long = "x".repeat(600);
        let out = sanitize_payload(
            json!({"text": long, "nested": {"items": [long]}, "length": 600}),
            "viva_1",
            500,
        );
        assert_eq!(out["text"].as_str().unwrap().len(), 500);
        assert_eq!(out["nested"]["items"][0].as_str().unwrap().len(), 500);
        assert_eq!(out["length"], 600);
    }

    #[test]
    fn sanitize_overrides_client_session_tag() {
        let out = sanitize_payload(json!({"session_id": "viva_spoofed"}), "viva_1", 500);
        assert_eq!(out["session_id"], "viva_1");
    }

    #[test]
    fn normalize_counts_ignored() {
        let batch = EventBatch::from(vec![
            RawEvent {
                event_type: "blur".into(),
                event_data: json!({}),
            },
            RawEvent {
                event_type: "typing_cadence".into(),
                event_data: json!({"wpm": 40}),
            },
            RawEvent {
                event_type: "unknown".into(),
                event_data: json!({}),
            },
        ]);
        let (accepted, ignored) = normalize(batch, &assignment(true, false, true), "viva_1", 500);
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].event_type, "blur");
        assert_eq!(accepted[0].event_data["session_id"], "viva_1");
        assert_eq!(ignored, 2);
    }
}
