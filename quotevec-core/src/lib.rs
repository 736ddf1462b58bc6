pub mod config;
pub mod embeddings;
pub mod error;
pub mod models;
pub mod retrieve;
pub mod store;

pub use config::QuoteVecConfig;
pub use embeddings::{
    create_backend, EmbeddingBackend, EmbeddingError, HuggingFaceConfig,
    HuggingFaceEmbeddingClient, MINILM_DIMENSIONS,
};
pub use error::QuoteVecError;
pub use models::{BatchWriteResult, QueryResult, Record, StoredObject, VectorizedRecord};
pub use retrieve::QueryPipeline;
pub use store::{InMemoryVectorStore, PgVectorStore, StoreError, VectorStore};
