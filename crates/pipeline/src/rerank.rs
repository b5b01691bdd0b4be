//! Document-type weighted reranking.
//!
//! Reorders retrieved chunks by `score * weight`, where the weight is keyed
//! on the chunk's document type. A composite document type inherits its
//! weight key from the parent document type instead of its own.

use crate::chunk::{RejectedResult, ResultSet, RetrievedChunk, WeightedResult};
use crate::config::RerankConfig;

/// Reorders candidate chunks using document-type weighting.
#[derive(Clone)]
pub struct Reranker {
    config: RerankConfig,
}

impl Reranker {
    pub fn new(config: RerankConfig) -> Self {
        Self { config }
    }

    /// Rerank candidate chunks into a result set.
    ///
    /// The accepted sequence is sorted by weighted score descending; ties
    /// keep their input order (stable sort), which matters because the
    /// default weight of 1.0 makes exact ties common. Chunks below the
    /// configured threshold move to the rejected sequence with a reason,
    /// never silently dropped.
    pub fn rerank(&self, chunks: Vec<RetrievedChunk>) -> ResultSet {
        let candidates = chunks.len();

        let mut weighted: Vec<WeightedResult> = chunks
            .into_iter()
            .map(|chunk| {
                let weight = self.weight_for(&chunk);
                let weighted_score = chunk.score * weight;
                WeightedResult::new(chunk, weighted_score, weight)
            })
            .collect();

        // sort_by is stable, so equal weighted scores retain input order
        weighted.sort_by(|a, b| {
            b.weighted_score
                .partial_cmp(&a.weighted_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut results = Vec::new();
        let mut rejected = Vec::new();

        for result in weighted {
            match self.config.score_threshold {
                Some(threshold) if result.weighted_score < threshold => {
                    rejected.push(RejectedResult {
                        reason: format!(
                            "weighted score {:.3} below threshold {:.3}",
                            result.weighted_score, threshold
                        ),
                        result,
                    });
                }
                _ => results.push(result),
            }
        }

        tracing::debug!(
            "Reranked {} candidates: {} accepted, {} rejected",
            candidates,
            results.len(),
            rejected.len()
        );

        let mut metrics = std::collections::HashMap::new();
        metrics.insert("candidates".to_string(), candidates as f64);
        metrics.insert("accepted".to_string(), results.len() as f64);
        metrics.insert("rejected".to_string(), rejected.len() as f64);

        ResultSet {
            results,
            rejected,
            metrics,
        }
    }

    /// Weighting factor for a chunk.
    ///
    /// The key is the chunk's own document type, except for the composite
    /// type, which uses the parent document type. Unmapped keys weigh 1.0.
    fn weight_for(&self, chunk: &RetrievedChunk) -> f64 {
        let key = match chunk.document_type.as_deref() {
            Some(doc_type) if doc_type == self.config.composite_document_type => {
                chunk.parent_document_type.as_deref()
            }
            other => other,
        };

        key.and_then(|k| self.config.weights.get(k))
            .copied()
            .unwrap_or(1.0)
    }
}
