//! Retrieval — free-text query to ranked quotes
//!
//! Embeds the query with the same backend used at ingestion time, asks the
//! store for the nearest vectors in the configured class, and returns the
//! quote text with its `certainty` and `distance`, highest certainty first.
//! There is no keyword fallback: embedding or store failures end the query.

use std::sync::Arc;

use crate::embeddings::EmbeddingBackend;
use crate::error::QuoteVecError;
use crate::models::quote::{CHARACTER_PROPERTY, QUOTE_PROPERTY};
use crate::models::QueryResult;
use crate::store::VectorStore;

const QUERY_FIELDS: [&str; 2] = [QUOTE_PROPERTY, CHARACTER_PROPERTY];

pub struct QueryPipeline {
    backend: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn VectorStore>,
    class_name: String,
    limit: Option<usize>,
}

impl QueryPipeline {
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn VectorStore>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            class_name: class_name.into(),
            limit: None,
        }
    }

    /// Cap the number of results. `None` returns every match.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Blank input is rejected; any other text is embedded exactly as given.
    pub async fn query(&self, text: &str) -> Result<Vec<QueryResult>, QuoteVecError> {
        if text.trim().is_empty() {
            return Err(QuoteVecError::EmptyQuery);
        }

        let vector = self.backend.embed(text).await?;

        let hits = self
            .store
            .nearest_vector_search(&self.class_name, &vector, &QUERY_FIELDS, self.limit)
            .await?;

        let mut results: Vec<QueryResult> = hits
            .into_iter()
            .filter_map(|mut hit| {
                // pgvector yields NaN distance for zero-norm vectors.
                if !hit.certainty.is_finite() || !hit.distance.is_finite() {
                    tracing::warn!(class = %self.class_name, "Skipping hit with non-finite distance");
                    return None;
                }
                let quote_text = hit.properties.remove(QUOTE_PROPERTY)?;
                Some(QueryResult {
                    quote_text,
                    character: hit.properties.remove(CHARACTER_PROPERTY),
                    certainty: hit.certainty,
                    distance: hit.distance,
                })
            })
            .collect();

        results.sort_by(|a, b| b.certainty.total_cmp(&a.certainty));

        tracing::info!(
            class = %self.class_name,
            store = self.store.name(),
            count = results.len(),
            "Query complete"
        );

        Ok(results)
    }
}

// ============================================================================
// TESTS
// ============================================================================
