//! Grounded answer composition.
//!
//! Builds a single chat request embedding the rephrased question, the top
//! accepted results' plain content with source attribution, and prior
//! conversation turns, then invokes the model once. Streaming is
//! synthesized later by the dispatcher; the model call itself is not
//! streamed.
//!
//! Citation contract: every chunk placed in the composition context is
//! cited as a source, deduplicated by URL, in context order. Chunks with no
//! URL cannot be cited and contribute context only.

use converse_core::{AppError, AppResult};
use converse_llm::{ChatMessage, ChatRequest, ChatResponse, LlmClient};
use converse_prompt::{render_prompt, PromptDefinition, Turn, TurnRole};
use std::collections::HashMap;
use std::sync::Arc;

use crate::chunk::{ResultSet, WeightedResult};
use crate::config::ComposeConfig;
use crate::models::Source;

/// A composed answer with its cited sources.
#[derive(Debug, Clone)]
pub struct ComposedAnswer {
    /// Response text, verbatim
    pub message: String,

    /// Sources cited for the chunks that were in context
    pub sources: Vec<Source>,

    /// Full model response, kept for metrics
    pub response: ChatResponse,
}

/// Builds grounded prompts and invokes the model.
#[derive(Clone)]
pub struct Composer {
    llm: Arc<dyn LlmClient>,
    definition: PromptDefinition,
    config: ComposeConfig,
    model: String,
}

impl Composer {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        definition: PromptDefinition,
        config: ComposeConfig,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            definition,
            config,
            model: model.into(),
        }
    }

    /// Compose an answer for the rephrased question.
    ///
    /// An empty result set composes against no context; the prompt then
    /// instructs the model to state the limits of what was found.
    pub async fn compose(
        &self,
        rephrased_question: &str,
        result_set: &ResultSet,
        history: &[Turn],
    ) -> AppResult<ComposedAnswer> {
        let context_results: Vec<&WeightedResult> = result_set
            .results
            .iter()
            .take(self.config.top_results)
            .collect();

        tracing::info!(
            "Composing answer from {} context chunks",
            context_results.len()
        );

        let mut variables = HashMap::new();
        variables.insert("question".to_string(), rephrased_question.to_string());

        if !context_results.is_empty() {
            variables.insert("context".to_string(), build_context(&context_results));
        }

        let rendered = render_prompt(&self.definition, variables)?;

        let mut messages = Vec::new();
        if let Some(system) = rendered.system {
            messages.push(ChatMessage::system(system));
        }
        for turn in history {
            messages.push(match turn.role {
                TurnRole::User => ChatMessage::user(turn.content.clone()),
                TurnRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            });
        }
        messages.push(ChatMessage::user(rendered.user));

        let request = ChatRequest::new(messages, &self.model)
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature);

        let response = self
            .llm
            .chat(&request)
            .await
            .map_err(|e| AppError::Composition(format!("Answer generation failed: {}", e)))?;

        let sources = extract_sources(&context_results);

        Ok(ComposedAnswer {
            message: response.content.clone(),
            sources,
            response,
        })
    }
}

/// Build the numbered context block with source attribution.
fn build_context(results: &[&WeightedResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| {
            let mut header = result.title().unwrap_or("Untitled").to_string();

            let headings = result.heading_hierarchy();
            if !headings.is_empty() {
                header.push_str(" > ");
                header.push_str(&headings.join(" > "));
            }

            if let Some(url) = result.url() {
                header.push_str(&format!(" ({})", url));
            }

            format!(
                "[{}] {}\n{}",
                i + 1,
                header,
                result.plain_content().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Map context chunks to cited sources, deduplicated by URL.
fn extract_sources(results: &[&WeightedResult]) -> Vec<Source> {
    let mut seen = std::collections::HashSet::new();
    let mut sources = Vec::new();

    for result in results {
        let url = match result.url() {
            Some(url) => url.to_string(),
            None => continue,
        };

        if !seen.insert(url.clone()) {
            continue;
        }

        sources.push(Source {
            url,
            title: result
                .title()
                .or(result.base_path())
                .unwrap_or("Untitled")
                .to_string(),
            heading: result.heading_hierarchy().last().cloned(),
        });
    }

    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::RetrievedChunk;
    use crate::config::RerankConfig;
    use crate::rerank::Reranker;
    use converse_llm::MockLlmClient;
    use converse_prompt::templates;
    use serde_json::json;

    fn composer(mock: Arc<MockLlmClient>) -> Composer {
        Composer::new(
            mock,
            templates::compose_prompt(),
            ComposeConfig::default(),
            "mock-model",
        )
    }

    fn result_set(hits: Vec<serde_json::Value>) -> ResultSet {
        let chunks: Vec<RetrievedChunk> = hits
            .into_iter()
            .map(|h| serde_json::from_value(h).unwrap())
            .collect();
        Reranker::new(RerankConfig::default()).rerank(chunks)
    }

    fn tax_result_set() -> ResultSet {
        result_set(vec![
            json!({
                "id": "chunk-1",
                "score": 1.0,
                "title": "Pay your Corporation Tax bill",
                "url": "https://example.gov/pay-corporation-tax",
                "heading_hierarchy": ["Overview"],
                "plain_content": "You must pay Corporation Tax online.",
            }),
            json!({
                "id": "chunk-2",
                "score": 0.8,
                "title": "Pay your Corporation Tax bill",
                "url": "https://example.gov/pay-corporation-tax",
                "plain_content": "Deadlines depend on your accounting period.",
            }),
            json!({
                "id": "chunk-3",
                "score": 0.5,
                "title": "Corporation Tax rates",
                "url": "https://example.gov/corporation-tax-rates",
                "plain_content": "The main rate applies to most profits.",
            }),
        ])
    }

    #[tokio::test]
    async fn test_message_is_model_output_verbatim() {
        let mock = Arc::new(MockLlmClient::new());
        mock.enqueue_text("Pay online through your company account.");

        let composed = composer(mock)
            .compose("How do I pay my corporation tax", &tax_result_set(), &[])
            .await
            .unwrap();

        assert_eq!(composed.message, "Pay online through your company account.");
    }

    #[tokio::test]
    async fn test_sources_deduplicate_by_url_in_context_order() {
        let mock = Arc::new(MockLlmClient::new());
        mock.enqueue_text("answer");

        let composed = composer(mock)
            .compose("How do I pay my corporation tax", &tax_result_set(), &[])
            .await
            .unwrap();

        assert_eq!(composed.sources.len(), 2);
        assert_eq!(
            composed.sources[0].url,
            "https://example.gov/pay-corporation-tax"
        );
        assert_eq!(composed.sources[0].heading.as_deref(), Some("Overview"));
        assert_eq!(
            composed.sources[1].url,
            "https://example.gov/corporation-tax-rates"
        );
    }

    #[tokio::test]
    async fn test_context_embeds_chunk_content_and_attribution() {
        let mock = Arc::new(MockLlmClient::new());
        mock.enqueue_text("answer");

        let c = composer(mock.clone());
        c.compose("How do I pay my corporation tax", &tax_result_set(), &[])
            .await
            .unwrap();

        let requests = mock.requests();
        let system = &requests[0].messages[0].content;
        assert!(system.contains("[1] Pay your Corporation Tax bill > Overview"));
        assert!(system.contains("You must pay Corporation Tax online."));
        assert!(system.contains("https://example.gov/pay-corporation-tax"));
    }

    #[tokio::test]
    async fn test_history_becomes_role_tagged_messages() {
        let mock = Arc::new(MockLlmClient::new());
        mock.enqueue_text("answer");

        let history = vec![
            Turn::user("How do I pay my tax"),
            Turn::assistant("What type of tax"),
        ];

        let c = composer(mock.clone());
        c.compose("How do I pay my corporation tax", &tax_result_set(), &history)
            .await
            .unwrap();

        let requests = mock.requests();
        let messages = &requests[0].messages;
        // system, two history turns, final user question
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].content, "How do I pay my tax");
        assert_eq!(messages[2].content, "What type of tax");
        assert_eq!(messages[3].content, "How do I pay my corporation tax");
    }

    #[tokio::test]
    async fn test_empty_result_set_composes_without_context() {
        let mock = Arc::new(MockLlmClient::new());
        mock.enqueue_text("I could not find anything about that.");

        let c = composer(mock.clone());
        let composed = c
            .compose("How do I pay my corporation tax", &ResultSet::empty(), &[])
            .await
            .unwrap();

        assert!(composed.sources.is_empty());
        let requests = mock.requests();
        let system = &requests[0].messages[0].content;
        assert!(system.contains("No relevant content was found"));
    }

    #[tokio::test]
    async fn test_top_results_bound_limits_context_and_sources() {
        let mock = Arc::new(MockLlmClient::new());
        mock.enqueue_text("answer");

        let hits: Vec<serde_json::Value> = (0..10)
            .map(|i| {
                json!({
                    "id": format!("chunk-{}", i),
                    "score": 1.0,
                    "title": format!("Doc {}", i),
                    "url": format!("https://example.gov/doc-{}", i),
                    "plain_content": "content",
                })
            })
            .collect();

        let composed = composer(mock)
            .compose("question", &result_set(hits), &[])
            .await
            .unwrap();

        // Default top_results is 5
        assert_eq!(composed.sources.len(), 5);
    }

    #[tokio::test]
    async fn test_model_failure_is_composition_error() {
        let mock = Arc::new(MockLlmClient::new());
        mock.enqueue_error("connection reset");

        let err = composer(mock)
            .compose("question", &tax_result_set(), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Composition(_)));
        assert!(err.to_string().contains("connection reset"));
    }
}
