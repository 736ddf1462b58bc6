//! quotevec — load quotes into a vector store and query them by meaning
//!
//! `quotevec --load` reads the configured CSV, embeds every quote and writes the
//! batch to the store. A query always runs afterwards (`--query`, default
//! "Vaya con Dios."). Any error is logged and ends the process with status 1.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use quotevec_core::config::StoreBackend;
use quotevec_core::{
    create_backend, BatchWriteResult, InMemoryVectorStore, PgVectorStore, QueryPipeline,
    QueryResult, QuoteVecConfig, VectorStore,
};
use quotevec_ingest::{CsvRecordSource, IngestionPipeline};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_QUERY: &str = "Vaya con Dios.";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "quotevec", author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config file (optional)
    #[arg(short, long, default_value = "quotevec.toml")]
    config: String,

    /// Load the CSV source into the vector store before querying
    #[arg(long)]
    load: bool,

    /// CSV file to load (overrides `[source] path`)
    #[arg(long)]
    source: Option<String>,

    /// Query text to search for
    #[arg(short, long, default_value = DEFAULT_QUERY)]
    query: String,

    /// Maximum number of results (overrides `[retrieval] limit`; default: all)
    #[arg(short = 'n', long)]
    limit: Option<usize>,

    /// Print results as a JSON array
    #[arg(long)]
    json: bool,

    /// Check Postgres and pgvector connectivity, then exit
    #[arg(long)]
    health: bool,
}

// ============================================================================
// Output
// ============================================================================

fn format_result(r: &QueryResult) -> String {
    format!(
        "{:.4}  {:.4}  {}: {}",
        r.certainty,
        r.distance,
        r.character.as_deref().unwrap_or("?"),
        r.quote_text
    )
}

fn render_results(results: &[QueryResult], json: bool) -> anyhow::Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(results)?);
    }
    let mut lines = vec![format!("{:<6}  {:<6}  quote", "cert", "dist")];
    lines.extend(results.iter().map(format_result));
    Ok(lines.join("\n"))
}

// ============================================================================
// Commands
// ============================================================================

async fn build_store(config: &QuoteVecConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; nothing persists after exit");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
        StoreBackend::Pgvector => {
            let store = PgVectorStore::connect(&config.store)
                .await
                .context("Failed to connect to vector store")?;
            store
                .bootstrap()
                .await
                .context("Failed to prepare vector store schema")?;
            Ok(Arc::new(store))
        }
    }
}

/// A load with any rejected object counts as failed.
fn ensure_all_stored(result: &BatchWriteResult) -> anyhow::Result<()> {
    if let Some(first) = result.failures().next() {
        anyhow::bail!(
            "{} of {} objects were rejected by the store (first: {}: {})",
            result.len() - result.stored_count(),
            result.len(),
            first.id,
            first.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

async fn run_health(config: &QuoteVecConfig) -> anyhow::Result<()> {
    let store = PgVectorStore::connect(&config.store)
        .await
        .context("Failed to connect to database")?;

    let pg_version = store
        .server_version()
        .await
        .context("PostgreSQL health check failed")?;
    println!("✅ PostgreSQL connected: {}", pg_version);

    match store
        .pgvector_version()
        .await
        .context("pgvector check failed")?
    {
        Some(version) => println!("✅ pgvector version: {}", version),
        None => anyhow::bail!("pgvector extension is not installed"),
    }

    Ok(())
}

async fn run(args: Args, config: QuoteVecConfig) -> anyhow::Result<()> {
    if args.health {
        return run_health(&config).await;
    }

    let backend = create_backend(&config.embedding, QuoteVecConfig::embedding_token())
        .context("Failed to create embedding client")?;
    let store = build_store(&config).await?;
    let class_name = config.store.class_name.clone();

    if args.load {
        let path = args.source.unwrap_or(config.source.path);
        let mut source = CsvRecordSource::from_path(&path)
            .with_context(|| format!("Failed to open {}", path))?;

        let result = IngestionPipeline::new(backend.clone(), store.clone(), class_name.as_str())
            .with_concurrency(config.embedding.concurrency as usize)
            .ingest_source(&mut source)
            .await
            .with_context(|| format!("Failed to ingest {}", path))?;

        ensure_all_stored(&result)?;
        tracing::info!(stored = result.stored_count(), path = %path, "Load complete");
    }

    let results = QueryPipeline::new(backend, store, class_name)
        .with_limit(args.limit.or(config.retrieval.limit))
        .query(&args.query)
        .await
        .context("Query failed")?;

    println!("{}", render_results(&results, args.json)?);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Load .env file if present (dev convenience — production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config = match QuoteVecConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging: RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    if let Err(e) = run(args, config).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
