//! Prompt system for the Converse answer pipeline.
//!
//! This crate provides structured prompt management with:
//! - Built-in prompt definitions per pipeline stage
//! - YAML-based prompt definition overrides
//! - Handlebars template rendering
//! - Conversation-history rendering into role-labeled blocks

pub mod builder;
pub mod history;
pub mod loader;
pub mod templates;
pub mod types;

// Re-export main types
pub use builder::{render_prompt, render_template};
pub use history::{render_history, Turn, TurnRole, MAX_HISTORY_TURNS};
pub use loader::{load_prompt, resolve_prompt};
pub use types::{PromptDefinition, RenderedPrompt, RenderedPromptMetadata};
