#![allow(missing_docs, unused_results)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};

use async_trait::async_trait;
use assert_matches::assert_matches;
use serde_json::json;
use viva_core::constants::START_SENTINEL;
use viva_core::identity::Caller;
use viva_llm::{ChatMessage, ChatProvider, CompletionOptions, ProviderError, ProviderResult};
use viva_runtime::context::{ContextBudget, TRUNCATION_SUFFIX, assemble, load_sources};
use viva_runtime::examiner::FALLBACK_QUESTION;
use viva_runtime::{EventBatch, RawEvent, StartRequest, TurnRequest, TurnStatus, VivaError, VivaService};
use viva_settings::VivaSettings;
use viva_store::{ConnectionConfig, InclusionKind, MessageSender, NewAssignment, NewSubmission, VivaStore};

/// Counts calls and records system prompts; fails every call when `down`.
struct SpyProvider {
    calls: AtomicUsize,
    system_prompts: Mutex<Vec<String>>,
    down: bool,
}

impl SpyProvider {
    fn up() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            system_prompts: Mutex::new(Vec::new()),
            down: false,
        })
    }

    fn down() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            system_prompts: Mutex::new(Vec::new()),
            down: true,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatProvider for SpyProvider {
    fn model(&self) -> &str {
        "spy"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _options: &CompletionOptions,
    ) -> ProviderResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(first) = messages.first() {
            self.system_prompts.lock().unwrap().push(first.content.clone());
        }
        if self.down {
            return Err(ProviderError::Api {
                status: 502,
                message: "bad gateway".into(),
                retryable: true,
            });
        }
        Ok(json!({
            "question": "How does the cell use that energy?",
            "model_answer": "ATP hydrolysis drives cellular work."
        })
        .to_string())
    }
}

struct Harness {
    service: VivaService,
    provider: Arc<SpyProvider>,
    assignment_id: String,
}

impl Harness {
    fn new(store: VivaStore, assignment: &NewAssignment, provider: Arc<SpyProvider>) -> Self {
        let store = Arc::new(store);
        let assignment_id = store.create_assignment(assignment).unwrap().id;
        let service = VivaService::new(store, provider.clone(), VivaSettings::default());
        Self {
            service,
            provider,
            assignment_id,
        }
    }

    fn in_memory(assignment: &NewAssignment, provider: Arc<SpyProvider>) -> Self {
        Self::new(VivaStore::in_memory().unwrap(), assignment, provider)
    }

    fn submit(&self, student: &str, text: &str) -> String {
        self.service
            .store()
            .create_submission(&NewSubmission {
                assignment_id: self.assignment_id.clone(),
                student_id: student.into(),
                extracted_text: text.into(),
                ..NewSubmission::default()
            })
            .unwrap()
            .id
    }

    fn start(&self, student: &str, submission_id: &str) -> viva_runtime::Result<viva_runtime::StartedSession> {
        self.service
            .start_session(&Caller::student(student), submission_id, &StartRequest::default())
    }
}

fn assignment(max_attempts: i64) -> NewAssignment {
    NewAssignment {
        title: "Cell Biology".into(),
        max_attempts,
        ..NewAssignment::default()
    }
}

#[test]
fn concurrent_starts_converge_on_one_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("viva.db");
    let store = VivaStore::open(path.to_str().unwrap(), &ConnectionConfig::default()).unwrap();
    let harness = Harness::new(store, &assignment(1), SpyProvider::up());
    let submission_id = harness.submit("u1", "essay");

    let barrier = Barrier::new(2);
    let (barrier, shared, submission) = (&barrier, &harness, submission_id.as_str());
    let ids: Vec<String> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                scope.spawn(move || {
                    barrier.wait();
                    shared.start("u1", submission).unwrap().session_id
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(ids[0], ids[1]);

    let active = harness.service.store().find_active_session(&submission_id).unwrap().unwrap();
    assert_eq!(active.id, ids[0]);
    let again = harness.start("u1", &submission_id).unwrap();
    assert_eq!(again.attempts_used, 1);
}

#[tokio::test]
async fn attempt_ceiling_counts_ended_sessions() {
    let harness = Harness::in_memory(&assignment(2), SpyProvider::up());
    let caller = Caller::student("u1");
    let submission_id = harness.submit("u1", "essay");

    for expected_left in [1, 0] {
        let started = harness.start("u1", &submission_id).unwrap();
        assert_eq!(started.attempts_left, expected_left);
        harness
            .service
            .end_session(&caller, &started.session_id, Some(60))
            .await
            .unwrap();
    }
    assert_matches!(
        harness.start("u1", &submission_id),
        Err(VivaError::NoAttemptsRemaining { max_attempts: 2 })
    );
}

#[test]
fn unlimited_attempts_survive_a_hundred_sessions() {
    let harness = Harness::in_memory(&assignment(0), SpyProvider::up());
    let submission_id = harness.submit("u1", "essay");
    for _ in 0..100 {
        let started = harness.start("u1", &submission_id).unwrap();
        harness
            .service
            .store()
            .mark_session_ended(&started.session_id, "2030-01-01T00:00:00.000000Z", 600)
            .unwrap();
    }
    let started = harness.start("u1", &submission_id).unwrap();
    assert_eq!(started.attempts_left, -1);
    assert_eq!(started.attempts_used, 101);
}

#[tokio::test]
async fn long_submission_is_capped_per_source() {
    let harness = Harness::in_memory(&assignment(1), SpyProvider::up());
    let long = "a".repeat(10_000);
    let submission_id = harness.submit("u1", &long);
    let started = harness.start("u1", &submission_id).unwrap();

    let session = harness.service.store().get_session(&started.session_id).unwrap().unwrap();
    let sources = load_sources(harness.service.store(), &session).unwrap();
    let context = assemble(&sources, ContextBudget::from(&VivaSettings::default().context));
    assert_eq!(context, format!("{}{TRUNCATION_SUFFIX}", "a".repeat(4_000)));

    harness
        .service
        .post_turn(&Caller::student("u1"), &started.session_id, TurnRequest::student(START_SENTINEL))
        .await
        .unwrap();
    let prompt = harness.provider.system_prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains(&context));
    assert!(!prompt.contains(&"a".repeat(4_001)));
}

#[tokio::test]
async fn upstream_outage_yields_fallback_question() {
    let harness = Harness::in_memory(&assignment(1), SpyProvider::down());
    let submission_id = harness.submit("u1", "essay");
    let started = harness.start("u1", &submission_id).unwrap();

    let outcome = harness
        .service
        .post_turn(&Caller::student("u1"), &started.session_id, TurnRequest::student("I think so"))
        .await
        .unwrap();
    assert_eq!(outcome.ai_text.as_deref(), Some(FALLBACK_QUESTION));
    assert_eq!(outcome.status, TurnStatus::Error);

    let transcript = harness.service.store().list_messages(&started.session_id).unwrap();
    assert_eq!(transcript.last().unwrap().sender, MessageSender::Ai);
    assert_eq!(transcript.last().unwrap().text, FALLBACK_QUESTION);
}

#[tokio::test]
async fn second_end_never_regenerates_feedback() {
    let harness = Harness::in_memory(&assignment(1), SpyProvider::up());
    let caller = Caller::student("u1");
    let submission_id = harness.submit("u1", "essay");
    let started = harness.start("u1", &submission_id).unwrap();

    harness.service.end_session(&caller, &started.session_id, None).await.unwrap();
    let after_first = harness.service.store().get_session(&started.session_id).unwrap().unwrap();
    let calls = harness.provider.calls();
    assert_eq!(calls, 1);

    let second = harness.service.end_session(&caller, &started.session_id, Some(5)).await.unwrap();
    assert!(second.already_ended);
    assert_eq!(harness.provider.calls(), calls);

    let after_second = harness.service.store().get_session(&started.session_id).unwrap().unwrap();
    assert_eq!(after_second.ended_at, after_first.ended_at);
    assert_eq!(after_second.feedback_text, after_first.feedback_text);
    assert_eq!(after_second.duration_seconds, after_first.duration_seconds);
}

#[test]
fn blur_flag_follows_event_tracking() {
    let blurs = || {
        EventBatch::from(vec![
            RawEvent {
                event_type: "blur".into(),
                event_data: json!({}),
            };
            3
        ])
    };

    for (tracking, expected) in [
        (false, Vec::<String>::new()),
        (true, vec!["Frequent tab/window switching (3×).".to_string()]),
    ] {
        let harness = Harness::in_memory(
            &NewAssignment {
                event_tracking: tracking,
                ..assignment(1)
            },
            SpyProvider::up(),
        );
        let submission_id = harness.submit("u1", "essay");
        let started = harness.start("u1", &submission_id).unwrap();
        harness
            .service
            .log_events(&Caller::student("u1"), &started.session_id, blurs())
            .unwrap();
        assert_eq!(harness.service.compute_flags(&started.session_id).unwrap(), expected);
    }
}

#[test]
fn toggle_after_end_leaves_link_unchanged() {
    let harness = Harness::in_memory(&assignment(1), SpyProvider::up());
    let caller = Caller::student("u1");
    let submission_id = harness.submit("u1", "essay");
    let started = harness.start("u1", &submission_id).unwrap();
    harness
        .service
        .store()
        .mark_session_ended(&started.session_id, "2030-01-01T00:00:00.000000Z", 60)
        .unwrap();

    assert_matches!(
        harness.service.toggle_inclusion(
            &caller,
            &started.session_id,
            InclusionKind::Submission,
            &submission_id,
            false
        ),
        Err(VivaError::SessionEnded)
    );
    assert_eq!(
        harness
            .service
            .store()
            .get_inclusion(&started.session_id, InclusionKind::Submission, &submission_id)
            .unwrap(),
        Some(true)
    );
}

#[tokio::test]
async fn single_submission_opening_turn() {
    let text = "The mitochondria is the powerhouse of the cell.";
    let harness = Harness::in_memory(&assignment(1), SpyProvider::up());
    let submission_id = harness.submit("u1", text);
    let started = harness.start("u1", &submission_id).unwrap();
    assert!(started.included_resources.is_empty());

    let session = harness.service.store().get_session(&started.session_id).unwrap().unwrap();
    let sources = load_sources(harness.service.store(), &session).unwrap();
    assert_eq!(
        assemble(&sources, ContextBudget::from(&VivaSettings::default().context)),
        text
    );

    let outcome = harness
        .service
        .post_turn(&Caller::student("u1"), &started.session_id, TurnRequest::student(START_SENTINEL))
        .await
        .unwrap();
    assert!(!outcome.ai_text.unwrap_or_default().is_empty());

    let transcript = harness.service.store().list_messages(&started.session_id).unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].sender, MessageSender::Student);
    assert_eq!(transcript[0].text, START_SENTINEL);
    assert_eq!(transcript[1].sender, MessageSender::Ai);
    assert!(!transcript[1].text.is_empty());
}
