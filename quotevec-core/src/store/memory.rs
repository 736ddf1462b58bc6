use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{
    certainty_from_distance, check_vector, cosine_distance, select_fields, validate_class,
    validate_fields, StoreError, VectorStore,
};
use crate::models::{BatchWriteResult, ObjectWriteResult, SearchHit, StoredObject};

#[derive(Debug)]
struct ClassEntry {
    dimensions: usize,
    objects: Vec<StoredObject>,
}

/// Process-local vector store. Contents live as long as the value does.
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    classes: RwLock<HashMap<String, ClassEntry>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects stored under `class_name` (0 for unknown classes).
    pub async fn object_count(&self, class_name: &str) -> usize {
        self.classes
            .read()
            .await
            .get(class_name)
            .map(|c| c.objects.len())
            .unwrap_or(0)
    }

    pub async fn objects(&self, class_name: &str) -> Vec<StoredObject> {
        self.classes
            .read()
            .await
            .get(class_name)
            .map(|c| c.objects.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_class(&self, name: &str, dimensions: usize) -> Result<(), StoreError> {
        validate_class(name, dimensions)?;

        let mut classes = self.classes.write().await;
        if let Some(existing) = classes.get(name) {
            return Err(StoreError::AlreadyExists {
                class: name.to_string(),
                dimensions: existing.dimensions,
            });
        }

        classes.insert(
            name.to_string(),
            ClassEntry {
                dimensions,
                objects: Vec::new(),
            },
        );
        tracing::debug!(class = name, dimensions, "Created in-memory class");
        Ok(())
    }

    async fn write_batch(&self, objects: Vec<StoredObject>) -> Result<BatchWriteResult, StoreError> {
        let mut classes = self.classes.write().await;
        let mut result = BatchWriteResult::default();

        for object in objects {
            let Some(entry) = classes.get_mut(&object.class_name) else {
                result.objects.push(ObjectWriteResult::rejected(
                    object.id,
                    format!("unknown class {}", object.class_name),
                ));
                continue;
            };

            if let Err(reason) = check_vector(&object.vector, entry.dimensions) {
                result
                    .objects
                    .push(ObjectWriteResult::rejected(object.id, reason));
                continue;
            }

            if entry.objects.iter().any(|o| o.id == object.id) {
                result
                    .objects
                    .push(ObjectWriteResult::rejected(object.id, "duplicate id"));
                continue;
            }

            result.objects.push(ObjectWriteResult::stored(object.id));
            entry.objects.push(object);
        }

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

        let classes = self.classes.read().await;
        let entry = classes
            .get(class_name)
            .ok_or_else(|| StoreError::UnknownClass(class_name.to_string()))?;

        if vector.len() != entry.dimensions {
            return Err(StoreError::DimensionMismatch {
                class: class_name.to_string(),
                expected: entry.dimensions,
                actual: vector.len(),
            });
        }

        let mut hits: Vec<SearchHit> = entry
            .objects
            .iter()
            .map(|o| {
                let distance = cosine_distance(vector, &o.vector);
                SearchHit {
                    properties: select_fields(&o.properties, fields),
                    certainty: certainty_from_distance(distance),
                    distance,
                }
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        if let Some(limit) = limit {
            hits.truncate(limit);
        }

        Ok(hits)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
