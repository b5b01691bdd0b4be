//! LLM integration crate for the Converse answer pipeline.
//!
//! This crate provides a provider-agnostic abstraction for interacting with
//! Large Language Models (LLMs). It supports multiple providers through a
//! unified trait-based chat interface.
//!
//! # Providers
//! - **Ollama**: Local LLM runtime via its OpenAI-compatible endpoint (default)
//! - **OpenAI**: Hosted chat completions API
//! - **Mock**: Scripted in-process provider for tests
//!
//! # Example
//! ```no_run
//! use converse_llm::{ChatMessage, ChatRequest, LlmClient, providers::OpenAiCompatClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = OpenAiCompatClient::new("ollama", "http://localhost:11434/v1", None);
//! let request = ChatRequest::new(vec![ChatMessage::user("Hello, world!")], "llama3.2");
//! let response = client.chat(&request).await?;
//! println!("{}", response.content);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod factory;
pub mod providers;

// Re-export main types
pub use client::{
    ChatMessage, ChatRequest, ChatResponse, ChatRole, FinishReason, LlmClient, TokenUsage,
};
pub use factory::create_client;
pub use providers::{MockLlmClient, OpenAiCompatClient};
