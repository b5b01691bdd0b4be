//! Grounded answer-generation pipeline.
//!
//! Answers free-text questions by retrieving content chunks from an
//! external search index, reranking them by document-type weight, checking
//! question and answer against policy guardrails, composing a grounded
//! answer via a language model, and streaming it to a per-conversation
//! broadcast topic with cooperative mid-flight cancellation.

pub mod broadcast;
pub mod cancel;
pub mod chunk;
pub mod compose;
pub mod config;
pub mod dispatch;
pub mod guardrail;
pub mod models;
pub mod pipeline;
pub mod rephrase;
pub mod rerank;
pub mod search;
pub mod store;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use broadcast::{conversation_topic, Broadcaster, StreamEvent};
pub use cancel::{CancellationStore, CANCELLATION_TTL};
pub use chunk::{RejectedResult, ResultSet, RetrievedChunk, WeightedResult};
pub use compose::{ComposedAnswer, Composer};
pub use config::{
    ComposeConfig, GuardrailConfig, PipelineConfig, RerankConfig, StreamingConfig,
};
pub use dispatch::{JobState, StreamingDispatcher};
pub use guardrail::{GuardrailError, GuardrailEvaluator, GuardrailResult};
pub use models::{build_history, Answer, AnswerDraft, Conversation, Question, Source};
pub use pipeline::AnswerPipeline;
pub use rephrase::{Rephrased, Rephraser};
pub use rerank::Reranker;
pub use search::{HttpSearchClient, Retriever, SearchClient, StaticSearchClient};
pub use store::{ConversationStore, InMemoryStore};
