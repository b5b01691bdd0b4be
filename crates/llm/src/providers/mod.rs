//! LLM provider implementations.

pub mod mock;
pub mod openai;

pub use mock::MockLlmClient;
pub use openai::OpenAiCompatClient;
