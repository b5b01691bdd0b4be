//! Retrieved chunk types.
//!
//! A `RetrievedChunk` is the unit of retrieval: a bounded fragment of
//! indexed content with positional and heading metadata. Reranking wraps
//! chunks in `WeightedResult` by composition, never by copying fields.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A content fragment returned by the search index.
///
/// Only the identifier is required. Every other field defaults to an
/// explicit absent value when the index omits it, and unknown field names
/// are rejected outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievedChunk {
    /// Index-assigned identifier
    pub id: String,

    /// Raw relevance score from the index
    #[serde(default)]
    pub score: f64,

    /// Position of this chunk within its document
    #[serde(default)]
    pub chunk_index: Option<u32>,

    /// Rendered HTML fragment
    #[serde(default)]
    pub html_content: Option<String>,

    /// Stable content identifier of the owning document
    #[serde(default)]
    pub content_id: Option<String>,

    /// Heading path from document root to this chunk
    #[serde(default)]
    pub heading_hierarchy: Vec<String>,

    /// Content digest
    #[serde(default)]
    pub digest: Option<String>,

    /// Site base path of the owning document
    #[serde(default)]
    pub base_path: Option<String>,

    /// Document locale
    #[serde(default)]
    pub locale: Option<String>,

    /// Document type, the reranking weight key
    #[serde(default)]
    pub document_type: Option<String>,

    /// Parent document type, the weight key for composite types
    #[serde(default)]
    pub parent_document_type: Option<String>,

    /// Document title
    #[serde(default)]
    pub title: Option<String>,

    /// Document description
    #[serde(default)]
    pub description: Option<String>,

    /// Canonical URL of the chunk
    #[serde(default)]
    pub url: Option<String>,

    /// Plain-text content, bounded upstream before composition
    #[serde(default)]
    pub plain_content: Option<String>,
}

/// A retrieved chunk decorated with its reranked score.
///
/// Composition rather than delegation: the inner chunk stays intact and
/// read access goes through accessors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedResult {
    chunk: RetrievedChunk,

    /// `score * weight` for the chunk's weighting key
    pub weighted_score: f64,

    /// The weighting factor that was applied
    pub weight: f64,
}

impl WeightedResult {
    /// Wrap a chunk with its computed weighting.
    pub fn new(chunk: RetrievedChunk, weighted_score: f64, weight: f64) -> Self {
        Self {
            chunk,
            weighted_score,
            weight,
        }
    }

    /// The wrapped chunk.
    pub fn chunk(&self) -> &RetrievedChunk {
        &self.chunk
    }

    /// Raw relevance score from the index.
    pub fn score(&self) -> f64 {
        self.chunk.score
    }

    pub fn document_type(&self) -> Option<&str> {
        self.chunk.document_type.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.chunk.title.as_deref()
    }

    pub fn url(&self) -> Option<&str> {
        self.chunk.url.as_deref()
    }

    pub fn base_path(&self) -> Option<&str> {
        self.chunk.base_path.as_deref()
    }

    pub fn heading_hierarchy(&self) -> &[String] {
        &self.chunk.heading_hierarchy
    }

    pub fn plain_content(&self) -> Option<&str> {
        self.chunk.plain_content.as_deref()
    }
}

/// A result rejected during reranking, kept for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedResult {
    pub result: WeightedResult,
    pub reason: String,
}

/// Outcome of a retrieval and rerank pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    /// Accepted results, best first
    pub results: Vec<WeightedResult>,

    /// Rejected results with their rejection reason
    pub rejected: Vec<RejectedResult>,

    /// Diagnostic metrics (counts, latencies)
    pub metrics: HashMap<String, f64>,
}

impl ResultSet {
    /// An empty result set.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty() && self.rejected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_construction_defaults_all_other_fields() {
        let chunk: RetrievedChunk = serde_json::from_value(json!({
            "id": "chunk-1",
            "content_id": "content-9",
            "locale": "en",
            "base_path": "/pay-corporation-tax",
        }))
        .unwrap();

        assert_eq!(chunk.id, "chunk-1");
        assert_eq!(chunk.content_id.as_deref(), Some("content-9"));
        assert_eq!(chunk.locale.as_deref(), Some("en"));
        assert_eq!(chunk.base_path.as_deref(), Some("/pay-corporation-tax"));

        assert_eq!(chunk.score, 0.0);
        assert_eq!(chunk.chunk_index, None);
        assert_eq!(chunk.html_content, None);
        assert!(chunk.heading_hierarchy.is_empty());
        assert_eq!(chunk.digest, None);
        assert_eq!(chunk.document_type, None);
        assert_eq!(chunk.parent_document_type, None);
        assert_eq!(chunk.title, None);
        assert_eq!(chunk.description, None);
        assert_eq!(chunk.url, None);
        assert_eq!(chunk.plain_content, None);
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let result: Result<RetrievedChunk, _> = serde_json::from_value(json!({
            "id": "chunk-1",
            "page_rank": 3,
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_missing_identifier_is_rejected() {
        let result: Result<RetrievedChunk, _> = serde_json::from_value(json!({
            "score": 0.4,
        }));

        assert!(result.is_err());
    }

    #[test]
    fn test_weighted_result_reads_through_to_chunk() {
        let chunk: RetrievedChunk = serde_json::from_value(json!({
            "id": "chunk-1",
            "score": 1.5,
            "document_type": "guide",
            "title": "Pay your Corporation Tax bill",
            "url": "https://example.gov/pay-corporation-tax",
            "heading_hierarchy": ["Overview"],
        }))
        .unwrap();

        let result = WeightedResult::new(chunk, 3.0, 2.0);

        assert_eq!(result.score(), 1.5);
        assert_eq!(result.weighted_score, 3.0);
        assert_eq!(result.weight, 2.0);
        assert_eq!(result.document_type(), Some("guide"));
        assert_eq!(result.title(), Some("Pay your Corporation Tax bill"));
        assert_eq!(result.heading_hierarchy(), ["Overview"]);
    }

    #[test]
    fn test_empty_result_set() {
        let set = ResultSet::empty();
        assert!(set.is_empty());
        assert!(set.results.is_empty());
        assert!(set.rejected.is_empty());
    }
}
