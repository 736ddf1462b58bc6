use quotevec_core::{EmbeddingError, StoreError};
use thiserror::Error;

/// Malformed or unreadable tabular input.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Missing header row")]
    MissingHeader,

    #[error("Line {line}: expected {expected} columns, found {found}")]
    Format {
        line: u64,
        expected: usize,
        found: usize,
    },
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector store error: {0}")]
    Store(#[from] StoreError),

    #[error("Schema error: class {class} exists with {existing} dimensions, embeddings have {requested}")]
    Schema {
        class: String,
        existing: usize,
        requested: usize,
    },

    #[error("Record {index}: expected {expected}-dimensional embedding, got {actual}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },
}
