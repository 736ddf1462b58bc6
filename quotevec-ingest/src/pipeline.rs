//! Ingestion pipeline — records to vectorized objects in one batch write
//!
//! Two phases: every record is embedded first, then the whole set is written
//! with a single `write_batch`. Any embedding failure aborts before the store
//! sees a single object. The target class is declared before embedding starts
//! so that an unusable schema does not waste embedding calls.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use quotevec_core::models::{BatchWriteResult, Record, StoredObject, VectorizedRecord};
use quotevec_core::{EmbeddingBackend, StoreError, VectorStore};

use crate::error::IngestError;
use crate::source::RecordSource;

pub struct IngestionPipeline {
    backend: Arc<dyn EmbeddingBackend>,
    store: Arc<dyn VectorStore>,
    class_name: String,
    concurrency: usize,
}

impl IngestionPipeline {
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        store: Arc<dyn VectorStore>,
        class_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            store,
            class_name: class_name.into(),
            concurrency: 1,
        }
    }

    /// Maximum in-flight embedding calls. 1 (the default) is strictly sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Declare the target class. An existing class with matching dimensions is reused.
    pub async fn ensure_class(&self) -> Result<(), IngestError> {
        let requested = self.backend.dimensions();

        match self.store.create_class(&self.class_name, requested).await {
            Ok(()) => {
                tracing::info!(class = %self.class_name, dimensions = requested, "Created class");
                Ok(())
            }
            Err(StoreError::AlreadyExists { dimensions, .. }) if dimensions == requested => {
                tracing::info!(class = %self.class_name, dimensions, "Class already exists, reusing");
                Ok(())
            }
            Err(StoreError::AlreadyExists { class, dimensions }) => Err(IngestError::Schema {
                class,
                existing: dimensions,
                requested,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Embed every record, preserving input order. Fails fast on the first error.
    pub async fn embed_records(
        &self,
        records: Vec<Record>,
    ) -> Result<Vec<VectorizedRecord>, IngestError> {
        if self.concurrency == 1 {
            let mut vectorized = Vec::with_capacity(records.len());
            for (index, record) in records.into_iter().enumerate() {
                vectorized.push(self.embed_one(index, record).await?);
            }
            return Ok(vectorized);
        }

        // Dropping the stream on the first error cancels the calls still in flight.
        stream::iter(records.into_iter().enumerate())
            .map(|(index, record)| self.embed_one(index, record))
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    async fn embed_one(
        &self,
        index: usize,
        record: Record,
    ) -> Result<VectorizedRecord, IngestError> {
        let vector = self.backend.embed(&record.quote_text).await.map_err(|e| {
            tracing::error!(index, character = %record.character, error = %e, "Failed to embed record");
            e
        })?;

        let expected = self.backend.dimensions();
        if vector.len() != expected {
            return Err(IngestError::DimensionMismatch {
                index,
                expected,
                actual: vector.len(),
            });
        }

        Ok(VectorizedRecord { record, vector })
    }

    /// Declare the class, embed all records, then submit them as one batch.
    ///
    /// Per-object rejections come back in the result rather than as an error.
    pub async fn ingest(&self, records: Vec<Record>) -> Result<BatchWriteResult, IngestError> {
        self.ensure_class().await?;

        if records.is_empty() {
            tracing::info!(class = %self.class_name, "No records to ingest");
            return Ok(BatchWriteResult::default());
        }

        tracing::info!(
            records = records.len(),
            backend = self.backend.name(),
            concurrency = self.concurrency,
            "Embedding records"
        );

        let objects: Vec<StoredObject> = self
            .embed_records(records)
            .await?
            .into_iter()
            .map(|v| StoredObject::from_vectorized(&self.class_name, v))
            .collect();

        let result = self.store.write_batch(objects).await?;

        for failure in result.failures() {
            tracing::warn!(
                id = %failure.id,
                error = failure.error.as_deref().unwrap_or_default(),
                "Object rejected by store"
            );
        }

        tracing::info!(
            class = %self.class_name,
            store = self.store.name(),
            stored = result.stored_count(),
            rejected = result.len() - result.stored_count(),
            "Batch write complete"
        );

        Ok(result)
    }

    /// Read the whole source first so malformed input fails before any embedding call.
    pub async fn ingest_source<S: RecordSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<BatchWriteResult, IngestError> {
        let records = source.records()?;
        self.ingest(records).await
    }
}
