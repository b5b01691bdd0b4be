//! Chunked content retrieval from the external search index.
//!
//! The index itself is an external collaborator reached over HTTP; this
//! module holds the client boundary, the mapping of raw hits into
//! `RetrievedChunk`, and the word-count bound applied to chunk content
//! before it reaches the composition prompt.

use crate::chunk::RetrievedChunk;
use converse_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Maximum words of plain content kept per chunk.
///
/// Bounds prompt size regardless of how the index chunks its documents.
pub const MAX_CONTENT_WORDS: usize = 200;

/// Fields requested from the index for every hit.
pub const CHUNK_FIELDS: &[&str] = &[
    "score",
    "chunk_index",
    "html_content",
    "content_id",
    "heading_hierarchy",
    "digest",
    "base_path",
    "locale",
    "document_type",
    "parent_document_type",
    "title",
    "description",
    "url",
    "plain_content",
];

/// Trait for search index clients.
///
/// A query carries the query string and a field selection; the response is
/// a ranked list of raw hits. Implementations must be safe for concurrent
/// independent calls.
#[async_trait::async_trait]
pub trait SearchClient: Send + Sync {
    async fn search(&self, query: &str, fields: &[String]) -> AppResult<Vec<serde_json::Value>>;
}

/// Search index API request format.
#[derive(Debug, Serialize)]
struct SearchApiRequest<'a> {
    query: &'a str,
    fields: &'a [String],
}

/// Search index API response format.
#[derive(Debug, Deserialize)]
struct SearchApiResponse {
    results: Vec<serde_json::Value>,
}

/// HTTP search index client.
pub struct HttpSearchClient {
    /// Base URL for the search index
    base_url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpSearchClient {
    /// Create a new client against the index base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl SearchClient for HttpSearchClient {
    async fn search(&self, query: &str, fields: &[String]) -> AppResult<Vec<serde_json::Value>> {
        tracing::debug!("Querying search index: {}", query);

        let url = format!("{}/search", self.base_url);
        let request = SearchApiRequest { query, fields };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to reach search index: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Retrieval(format!(
                "Search index error ({}): {}",
                status, error_text
            )));
        }

        let api_response: SearchApiResponse = response
            .json()
            .await
            .map_err(|e| AppError::Retrieval(format!("Failed to parse index response: {}", e)))?;

        Ok(api_response.results)
    }
}

/// In-memory search client returning fixed hits, for tests and demos.
pub struct StaticSearchClient {
    hits: Vec<serde_json::Value>,
}

impl StaticSearchClient {
    pub fn new(hits: Vec<serde_json::Value>) -> Self {
        Self { hits }
    }
}

#[async_trait::async_trait]
impl SearchClient for StaticSearchClient {
    async fn search(&self, _query: &str, _fields: &[String]) -> AppResult<Vec<serde_json::Value>> {
        Ok(self.hits.clone())
    }
}

/// Retrieves candidate chunks for a query.
///
/// Maps each raw hit into a `RetrievedChunk` (absent fields default,
/// unknown fields fail) and truncates long plain content. Transport and
/// shape failures are fatal to the pipeline run; retry policy belongs to
/// the caller's job infrastructure.
#[derive(Clone)]
pub struct Retriever {
    client: std::sync::Arc<dyn SearchClient>,
    fields: Vec<String>,
}

impl Retriever {
    /// Create a retriever requesting the standard chunk fields.
    pub fn new(client: std::sync::Arc<dyn SearchClient>) -> Self {
        Self {
            client,
            fields: CHUNK_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Retrieve candidate chunks for a query.
    pub async fn retrieve(&self, query: &str) -> AppResult<Vec<RetrievedChunk>> {
        tracing::info!("Retrieving chunks for query: {}", query);

        let hits = self.client.search(query, &self.fields).await?;

        let mut chunks = Vec::with_capacity(hits.len());
        for hit in hits {
            let mut chunk: RetrievedChunk = serde_json::from_value(hit)
                .map_err(|e| AppError::Retrieval(format!("Malformed index hit: {}", e)))?;

            if let Some(content) = chunk.plain_content.take() {
                chunk.plain_content = Some(truncate_words(&content, MAX_CONTENT_WORDS));
            }

            chunks.push(chunk);
        }

        tracing::info!("Retrieved {} candidate chunks", chunks.len());

        Ok(chunks)
    }
}

/// Truncate text to a maximum word count.
fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_string();
    }

    words[..max_words].join(" ")
}
