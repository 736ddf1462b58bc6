use serde::{Deserialize, Serialize};

/// Property name holding the speaker label.
pub const CHARACTER_PROPERTY: &str = "character";

/// Property name holding the quote text.
pub const QUOTE_PROPERTY: &str = "quote";

/// A single row read from the ingestion source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub character: String,
    pub quote_text: String,
}

impl Record {
    pub fn new(character: impl Into<String>, quote_text: impl Into<String>) -> Self {
        Self {
            character: character.into(),
            quote_text: quote_text.into(),
        }
    }
}

/// A record paired with the embedding of its quote text.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorizedRecord {
    pub record: Record,
    pub vector: Vec<f32>,
}
