//! Test doubles shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use viva_llm::{ChatMessage, ChatProvider, CompletionOptions, ProviderError, ProviderResult};

/// A request the scripted provider received.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub messages: Vec<ChatMessage>,
    pub options: CompletionOptions,
}

/// Provider answering from a script, recording every request.
///
/// `Err(())` entries and an exhausted script both fail the call.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<String, ()>>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
}

impl ScriptedProvider {
    pub fn new(script: Vec<Result<String, ()>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    pub fn failing() -> Self {
        Self::new(Vec::new())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> RecordedRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> ProviderResult<String> {
        self.requests.lock().unwrap().push(RecordedRequest {
            messages: messages.to_vec(),
            options: options.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(())) | None => Err(ProviderError::Api {
                status: 503,
                message: "scripted failure".into(),
                retryable: true,
            }),
        }
    }
}
