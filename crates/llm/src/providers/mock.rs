//! Scripted mock LLM provider for tests.

use crate::client::{ChatRequest, ChatResponse, FinishReason, LlmClient, TokenUsage};
use converse_core::{AppError, AppResult};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted outcome for a mock chat call.
enum ScriptedReply {
    Text(String),
    Response(ChatResponse),
    Error(String),
}

/// Mock provider for testing and development.
///
/// Replies are scripted in order: each `chat` call pops the next reply and
/// records the request so tests can assert on the prompts that were built.
/// An exhausted script is a test bug and surfaces as an error.
pub struct MockLlmClient {
    replies: Mutex<VecDeque<ScriptedReply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    /// Create a mock with an empty script.
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain text reply with deterministic usage counters.
    pub fn enqueue_text(&self, text: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Text(text.into()));
    }

    /// Queue a fully specified response.
    pub fn enqueue_response(&self, response: ChatResponse) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Response(response));
    }

    /// Queue a transport-level failure.
    pub fn enqueue_error(&self, message: impl Into<String>) {
        self.replies
            .lock()
            .unwrap()
            .push_back(ScriptedReply::Error(message.into()));
    }

    /// Requests captured so far, in call order.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn text_response(text: String) -> ChatResponse {
        // Crude but deterministic counters, good enough for assertions
        let completion_tokens = text.split_whitespace().count() as u32;
        ChatResponse {
            content: text,
            model: "mock".to_string(),
            finish_reason: FinishReason::Stop,
            usage: TokenUsage::new(10, completion_tokens),
        }
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlmClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Llm("Mock script exhausted".to_string()))?;

        match reply {
            ScriptedReply::Text(text) => Ok(Self::text_response(text)),
            ScriptedReply::Response(response) => Ok(response),
            ScriptedReply::Error(message) => Err(AppError::Llm(message)),
        }
    }
}
