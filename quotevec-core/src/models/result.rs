use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A raw nearest-vector match as returned by a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Only the properties requested by the caller.
    pub properties: BTreeMap<String, String>,
    pub certainty: f64,
    pub distance: f64,
}

/// A ranked answer to a free-text query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub quote_text: String,
    pub character: Option<String>,
    pub certainty: f64,
    pub distance: f64,
}
