//! Pipeline configuration.
//!
//! Tuning knobs for every stage of the answer pipeline, deserializable from
//! the `answer` section of the application config file.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration for the whole answer pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model identifier used for all pipeline model calls
    #[serde(default = "default_model")]
    pub model: String,

    /// Guardrail evaluation settings
    #[serde(default)]
    pub guardrail: GuardrailConfig,

    /// Reranking settings
    #[serde(default)]
    pub rerank: RerankConfig,

    /// Answer composition settings
    #[serde(default)]
    pub compose: ComposeConfig,

    /// Streamed delivery settings
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Run the guardrail over generated answers as well as questions
    #[serde(default)]
    pub answer_guardrail_enabled: bool,
}

fn default_model() -> String {
    "llama3.2".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            guardrail: GuardrailConfig::default(),
            rerank: RerankConfig::default(),
            compose: ComposeConfig::default(),
            streaming: StreamingConfig::default(),
            answer_guardrail_enabled: false,
        }
    }
}

/// Guardrail evaluation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailConfig {
    /// Exact model output meaning "no violation"
    #[serde(default = "default_pass_value")]
    pub pass_value: String,

    /// Exact model output meaning "violation"
    #[serde(default = "default_fail_value")]
    pub fail_value: String,

    /// Token budget for the verdict
    #[serde(default = "default_guardrail_max_tokens")]
    pub max_tokens: u32,

    /// Optional logit bias constraining the verdict vocabulary,
    /// keyed by token id
    #[serde(default)]
    pub logit_bias: Option<HashMap<String, i32>>,
}

fn default_pass_value() -> String {
    "False".to_string()
}

fn default_fail_value() -> String {
    "True".to_string()
}

fn default_guardrail_max_tokens() -> u32 {
    5
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            pass_value: default_pass_value(),
            fail_value: default_fail_value(),
            max_tokens: default_guardrail_max_tokens(),
            logit_bias: None,
        }
    }
}

/// Reranking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    /// Multiplicative weight per document type
    #[serde(default)]
    pub weights: HashMap<String, f64>,

    /// Document type whose weight comes from its parent document type
    #[serde(default = "default_composite_document_type")]
    pub composite_document_type: String,

    /// Results below this weighted score are rejected (None keeps all)
    #[serde(default)]
    pub score_threshold: Option<f64>,
}

fn default_composite_document_type() -> String {
    "html_publication".to_string()
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            weights: HashMap::new(),
            composite_document_type: default_composite_document_type(),
            score_threshold: None,
        }
    }
}

/// Answer composition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Number of accepted results embedded in the composition context
    #[serde(default = "default_top_results")]
    pub top_results: usize,

    /// Token budget for the composed answer
    #[serde(default = "default_compose_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for composition
    #[serde(default = "default_compose_temperature")]
    pub temperature: f32,

    /// Message streamed when the question guardrail triggers
    #[serde(default = "default_refusal_message")]
    pub refusal_message: String,

    /// Message substituted when the answer guardrail triggers
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

fn default_top_results() -> usize {
    5
}

fn default_compose_max_tokens() -> u32 {
    1000
}

fn default_compose_temperature() -> f32 {
    0.0
}

fn default_refusal_message() -> String {
    "Sorry, I cannot help with that request.".to_string()
}

fn default_fallback_message() -> String {
    "Sorry, I cannot provide an answer to that question.".to_string()
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            top_results: default_top_results(),
            max_tokens: default_compose_max_tokens(),
            temperature: default_compose_temperature(),
            refusal_message: default_refusal_message(),
            fallback_message: default_fallback_message(),
        }
    }
}

/// Streamed delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Fixed pause between emitted chunks, in milliseconds. This also bounds
    /// cancellation latency, since the signal is polled between chunks.
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
}

fn default_chunk_delay_ms() -> u64 {
    75
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_delay_ms: default_chunk_delay_ms(),
        }
    }
}
