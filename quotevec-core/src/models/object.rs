use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::quote::{VectorizedRecord, CHARACTER_PROPERTY, QUOTE_PROPERTY};

/// An object as persisted by a vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub id: Uuid,
    pub class_name: String,
    pub properties: BTreeMap<String, String>,
    pub vector: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

impl StoredObject {
    pub fn new(
        class_name: impl Into<String>,
        properties: BTreeMap<String, String>,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            class_name: class_name.into(),
            properties,
            vector,
            created_at: Utc::now(),
        }
    }

    /// Build the stored form of a vectorized quote under `class_name`.
    pub fn from_vectorized(class_name: &str, vectorized: VectorizedRecord) -> Self {
        let VectorizedRecord { record, vector } = vectorized;
        let mut properties = BTreeMap::new();
        properties.insert(CHARACTER_PROPERTY.to_string(), record.character);
        properties.insert(QUOTE_PROPERTY.to_string(), record.quote_text);
        Self::new(class_name, properties, vector)
    }
}
