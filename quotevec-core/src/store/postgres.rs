use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::types::Json;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    certainty_from_distance, check_vector, select_fields, validate_class, validate_fields,
    StoreError, VectorStore,
};
use crate::config::StoreConfig;
use crate::models::{BatchWriteResult, ObjectWriteResult, SearchHit, StoredObject};

const BOOTSTRAP: [&str; 4] = [
    "CREATE EXTENSION IF NOT EXISTS vector",
    r#"
    CREATE TABLE IF NOT EXISTS vector_classes (
        name        TEXT PRIMARY KEY,
        dimensions  INTEGER NOT NULL CHECK (dimensions > 0),
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS vector_objects (
        id          UUID PRIMARY KEY,
        class_name  TEXT NOT NULL REFERENCES vector_classes (name) ON DELETE CASCADE,
        properties  JSONB NOT NULL DEFAULT '{}'::jsonb,
        vector      vector NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS vector_objects_class_name_idx ON vector_objects (class_name)",
];

/// Vector store backed by Postgres with the pgvector extension.
///
/// Classes live in `vector_classes`; objects in `vector_objects` with their
/// properties as JSONB. Distance is pgvector's cosine distance (`<=>`).
#[derive(Debug, Clone)]
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the extension and tables if they do not exist yet.
    pub async fn bootstrap(&self) -> Result<(), StoreError> {
        for statement in BOOTSTRAP {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::debug!("Vector store schema ready");
        Ok(())
    }

    /// `SELECT version()` of the connected server.
    pub async fn server_version(&self) -> Result<String, StoreError> {
        let row: (String,) = sqlx::query_as("SELECT version()")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Installed pgvector extension version, if any.
    pub async fn pgvector_version(&self) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT extversion FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(v,)| v))
    }

    async fn existing_ids(&self, ids: &[Uuid]) -> Result<HashSet<Uuid>, StoreError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM vector_objects WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn class_dimensions(&self, name: &str) -> Result<Option<usize>, StoreError> {
        let row: Option<(i32,)> =
            sqlx::query_as("SELECT dimensions FROM vector_classes WHERE name = $1")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(d,)| d as usize))
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn create_class(&self, name: &str, dimensions: usize) -> Result<(), StoreError> {
        validate_class(name, dimensions)?;

        let inserted: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO vector_classes (name, dimensions)
            VALUES ($1, $2)
            ON CONFLICT (name) DO NOTHING
            RETURNING name
            "#,
        )
        .bind(name)
        .bind(dimensions as i32)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_none() {
            let existing = self.class_dimensions(name).await?.unwrap_or(dimensions);
            return Err(StoreError::AlreadyExists {
                class: name.to_string(),
                dimensions: existing,
            });
        }

        tracing::info!(class = name, dimensions, "Created vector class");
        Ok(())
    }

    async fn write_batch(&self, objects: Vec<StoredObject>) -> Result<BatchWriteResult, StoreError> {
        let mut dimensions: HashMap<String, Option<usize>> = HashMap::new();
        for object in &objects {
            if !dimensions.contains_key(&object.class_name) {
                let dims = self.class_dimensions(&object.class_name).await?;
                dimensions.insert(object.class_name.clone(), dims);
            }
        }

        // Duplicates are rejected per object instead of failing the transaction.
        let ids: Vec<Uuid> = objects.iter().map(|o| o.id).collect();
        let mut seen = self.existing_ids(&ids).await?;

        let mut result = BatchWriteResult::default();
        let mut accepted = Vec::with_capacity(objects.len());

        for object in objects {
            let Some(expected) = dimensions.get(&object.class_name).copied().flatten() else {
                result.objects.push(ObjectWriteResult::rejected(
                    object.id,
                    format!("unknown class {}", object.class_name),
                ));
                continue;
            };
            if let Err(reason) = check_vector(&object.vector, expected) {
                result
                    .objects
                    .push(ObjectWriteResult::rejected(object.id, reason));
                continue;
            }
            if !seen.insert(object.id) {
                result
                    .objects
                    .push(ObjectWriteResult::rejected(object.id, "duplicate id"));
                continue;
            }
            result.objects.push(ObjectWriteResult::stored(object.id));
            accepted.push(object);
        }

        if accepted.is_empty() {
            return Ok(result);
        }

        // All accepted objects land together or not at all.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::BatchWrite(e.to_string()))?;

        for object in accepted {
            sqlx::query(
                r#"
                INSERT INTO vector_objects (id, class_name, properties, vector, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(object.id)
            .bind(&object.class_name)
            .bind(Json(&object.properties))
            .bind(Vector::from(object.vector))
            .bind(object.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::BatchWrite(format!("object {}: {}", object.id, e)))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::BatchWrite(e.to_string()))?;

        Ok(result)
    }

    async fn nearest_vector_search(
        &self,
        class_name: &str,
        vector: &[f32],
        fields: &[&str],
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, StoreError> {
        validate_fields(fields)?;

        let expected = self
            .class_dimensions(class_name)
            .await?
            .ok_or_else(|| StoreError::UnknownClass(class_name.to_string()))?;

        if vector.len() != expected {
            return Err(StoreError::DimensionMismatch {
                class: class_name.to_string(),
                expected,
                actual: vector.len(),
            });
        }

        // LIMIT NULL means no limit.
        let rows: Vec<(Json<BTreeMap<String, String>>, f64)> = sqlx::query_as(
            r#"
            SELECT properties, (vector <=> $1)::float8 AS distance
            FROM vector_objects
            WHERE class_name = $2
            ORDER BY vector <=> $1
            LIMIT $3
            "#,
        )
        .bind(Vector::from(vector.to_vec()))
        .bind(class_name)
        .bind(limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|(Json(properties), distance)| SearchHit {
                properties: select_fields(&properties, fields),
                certainty: certainty_from_distance(distance),
                distance,
            })
            .collect())
    }

    fn name(&self) -> &str {
        "pgvector"
    }
}

// ============================================================================
// TESTS
// ============================================================================
