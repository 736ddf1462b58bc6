//! Vector store contract and implementations
//!
//! A store holds schema classes (a name plus a fixed vector dimensionality),
//! accepts batched object writes with per-object results, and answers
//! nearest-vector queries annotated with `distance` and `certainty`.
//!
//! - [`PgVectorStore`] — Postgres + pgvector, cosine distance via `<=>`
//! - [`InMemoryVectorStore`] — process-local, for dry runs and tests

mod memory;
mod postgres;

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{BatchWriteResult, SearchHit, StoredObject};

pub use self::memory::InMemoryVectorStore;
pub use self::postgres::PgVectorStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Class {class} already exists with {dimensions} dimensions")]
    AlreadyExists { class: String, dimensions: usize },

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unknown class: {0}")]
    UnknownClass(String),

    #[error("Class {class} expects {expected}-dimensional vectors, got {actual}")]
    DimensionMismatch {
        class: String,
        expected: usize,
        actual: usize,
    },

    #[error("Batch write failed: {0}")]
    BatchWrite(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Database error: {0}")]
    Connection(#[from] sqlx::Error),
}

/// Write/query contract the pipelines need from a vector store.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Declare a class. Fails with `AlreadyExists` if the name is taken.
    async fn create_class(&self, name: &str, dimensions: usize) -> Result<(), StoreError>;

    /// Persist a batch. Objects naming an unknown class or carrying a vector of
    /// the wrong length are rejected individually; the rest are stored together.
    async fn write_batch(&self, objects: Vec<StoredObject>) -> Result<BatchWriteResult, StoreError>;

    /// Rank the objects of `class_name` by cosine distance to `vector`.
    ///
    /// `limit = None` returns every object of the class.
    async fn nearest_vector_search(
        &self,
        class_name: &str,
        vector: &[f32],
        fields: &[&str],
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, StoreError>;

    /// Store name for logging.
    fn name(&self) -> &str;
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn validate_class(name: &str, dimensions: usize) -> Result<(), StoreError> {
    if !is_identifier(name) {
        return Err(StoreError::Schema(format!("invalid class name {:?}", name)));
    }
    if dimensions == 0 {
        return Err(StoreError::Schema(format!(
            "class {} must have a positive dimensionality",
            name
        )));
    }
    Ok(())
}

pub(crate) fn validate_fields(fields: &[&str]) -> Result<(), StoreError> {
    if fields.is_empty() {
        return Err(StoreError::Query("at least one field must be requested".to_string()));
    }
    if let Some(bad) = fields.iter().find(|f| !is_identifier(f)) {
        return Err(StoreError::Query(format!("invalid field name {:?}", bad)));
    }
    Ok(())
}

/// Per-object vector check shared by every store's `write_batch`.
pub(crate) fn check_vector(vector: &[f32], expected: usize) -> Result<(), String> {
    if vector.len() != expected {
        return Err(format!("expected {} dimensions, got {}", expected, vector.len()));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err("vector contains non-finite values".to_string());
    }
    Ok(())
}

/// Keep only the requested properties.
pub(crate) fn select_fields(
    properties: &BTreeMap<String, String>,
    fields: &[&str],
) -> BTreeMap<String, String> {
    fields
        .iter()
        .filter_map(|f| properties.get(*f).map(|v| (f.to_string(), v.clone())))
        .collect()
}

/// Normalized similarity for a cosine distance in `[0, 2]`.
pub fn certainty_from_distance(distance: f64) -> f64 {
    (1.0 - distance / 2.0).clamp(0.0, 1.0)
}

/// Cosine distance `1 - cos(a, b)`. Zero-norm vectors are treated as orthogonal.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
