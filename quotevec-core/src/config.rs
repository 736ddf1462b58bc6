use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Environment variable holding the embedding service bearer token.
pub const EMBEDDING_TOKEN_ENV: &str = "HF_TOKEN";

/// Environment variable that overrides `[store] url`.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct QuoteVecConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub source: SourceConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: u32,
    pub use_cache: bool,
    pub wait_for_model: bool,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Maximum in-flight embedding calls during ingestion. 1 keeps ingestion sequential.
    pub concurrency: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            dimensions: 384,
            use_cache: true,
            wait_for_model: true,
            timeout_seconds: 30,
            max_retries: 0,
            retry_delay_ms: 500,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Pgvector,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub max_connections: u32,
    pub class_name: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Pgvector,
            url: "postgres://localhost:5432/quotevec".to_string(),
            max_connections: 5,
            class_name: "PointBreakQuote".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RetrievalConfig {
    /// Upper bound on query results. `None` returns every match.
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourceConfig {
    pub path: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: "quotes.csv".to_string(),
        }
    }
}

impl QuoteVecConfig {
    /// Load `path` (optional) layered under `QUOTEVEC__*` environment variables.
    ///
    /// `DATABASE_URL`, when set, replaces `store.url`.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("QUOTEVEC").separator("__"))
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.is_empty() {
                config.store.url = url;
            }
        }

        Ok(config)
    }

    /// Bearer token for the embedding service, read from `HF_TOKEN`.
    pub fn embedding_token() -> Option<String> {
        std::env::var(EMBEDDING_TOKEN_ENV).ok().filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_minilm() {
        let config = QuoteVecConfig::default();
        assert_eq!(config.embedding.dimensions, 384);
        assert_eq!(config.embedding.concurrency, 1);
        assert_eq!(config.embedding.max_retries, 0);
        assert!(config.embedding.use_cache);
        assert!(config.embedding.wait_for_model);
        assert_eq!(config.store.backend, StoreBackend::Pgvector);
        assert_eq!(config.store.class_name, "PointBreakQuote");
        assert!(config.retrieval.limit.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let s = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [embedding]
                dimensions = 768
                concurrency = 4

                [store]
                backend = "memory"

                [retrieval]
                limit = 3
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let config: QuoteVecConfig = s.try_deserialize().unwrap();

        assert_eq!(config.embedding.dimensions, 768);
        assert_eq!(config.embedding.concurrency, 4);
        assert_eq!(config.embedding.model, "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.max_connections, 5);
        assert_eq!(config.retrieval.limit, Some(3));
        assert_eq!(config.source.path, "quotes.csv");
    }
}
