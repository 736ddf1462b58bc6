use thiserror::Error;

use crate::embeddings::EmbeddingError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum QuoteVecError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("Query cannot be empty")]
    EmptyQuery,
}
