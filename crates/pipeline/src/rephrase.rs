//! History-aware question rephrasing.
//!
//! Rewrites the latest question into a standalone query using prior
//! conversation turns, so retrieval sees "How do I pay my corporation tax"
//! rather than a bare "corporation tax".

use converse_core::AppResult;
use converse_llm::{ChatMessage, ChatRequest, ChatResponse, LlmClient};
use converse_prompt::{render_history, render_prompt, PromptDefinition, Turn};
use std::collections::HashMap;
use std::sync::Arc;

/// A rephrased question with the response that produced it.
#[derive(Debug, Clone)]
pub struct Rephrased {
    /// The standalone question text, trimmed
    pub text: String,

    /// Full model response, kept for metrics
    pub response: ChatResponse,
}

/// Rewrites questions against conversation history.
#[derive(Clone)]
pub struct Rephraser {
    llm: Arc<dyn LlmClient>,
    definition: PromptDefinition,
    model: String,
}

impl Rephraser {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        definition: PromptDefinition,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            definition,
            model: model.into(),
        }
    }

    /// Rephrase a question using prior turns, most recent last.
    ///
    /// History renders into a bounded role-labeled block before template
    /// substitution; an empty history omits the block entirely. The output
    /// is the literal model text with surrounding whitespace trimmed.
    pub async fn rephrase(&self, question: &str, prior_turns: &[Turn]) -> AppResult<Rephrased> {
        let mut variables = HashMap::new();
        variables.insert("question".to_string(), question.to_string());

        if let Some(history) = render_history(prior_turns) {
            variables.insert("history".to_string(), history);
        }

        let rendered = render_prompt(&self.definition, variables)?;

        let mut messages = Vec::new();
        if let Some(system) = rendered.system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(rendered.user));

        let request = ChatRequest::new(messages, &self.model);
        let response = self.llm.chat(&request).await?;

        let text = response.content.trim().to_string();

        tracing::info!("Rephrased question: {}", text);

        Ok(Rephrased { text, response })
    }
}
