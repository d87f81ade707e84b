use anyhow::{Context, Result};
use sqlx::PgPool;
use std::sync::Arc;

use crate::adapters::{
    LogDeadLetterSink, MemoryTransactionStore, PgDeadLetterSink, PgTransactionStore, RetryingStore,
};
use crate::config::{Config, EmbeddingConfig, ProviderKind};
use crate::db;
use crate::embedding::{EmbeddingProvider, HashingEmbeddingProvider, HttpEmbeddingProvider};
use crate::pipeline::{EnrichmentPipeline, PipelineStats};
use crate::ports::{DeadLetterSink, TransactionStore};
use crate::services::{IngestService, PoolSettings};

/// Shared clients handed to every worker.
pub struct Components {
    pub provider: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn TransactionStore>,
    pub dead_letters: Arc<dyn DeadLetterSink>,
    pub pool: Option<PgPool>,
}

pub fn build_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider {
        ProviderKind::Hashing => Ok(Arc::new(HashingEmbeddingProvider::new(config.dimensions))),
        ProviderKind::Http => {
            let endpoint = config
                .endpoint
                .as_ref()
                .context("EMBEDDING_ENDPOINT is required when EMBEDDING_PROVIDER=http")?;
            let mut provider = HttpEmbeddingProvider::new(
                endpoint.as_str(),
                config.model.clone(),
                config.dimensions,
                config.timeout,
            )
            .context("Failed to build embedding HTTP client")?;
            if let Some(api_key) = &config.api_key {
                provider = provider.with_api_key(api_key.clone());
            }
            Ok(Arc::new(provider))
        }
    }
}

pub async fn connect_database(config: &Config) -> Result<PgPool> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is not set")?;
    db::create_pool(url, config.database_max_connections)
        .await
        .context("Failed to connect to database")
}

/// Connects storage and runs migrations when a database is configured;
/// otherwise falls back to the in-memory store and a log-only dead-letter sink.
pub async fn build_components(config: &Config) -> Result<Components> {
    let provider = build_provider(&config.embedding)?;

    let (store, dead_letters, pool) = match &config.database_url {
        Some(_) => {
            let pool = connect_database(config).await?;
            db::run_migrations(&pool).await?;
            let store = RetryingStore::new(
                PgTransactionStore::new(pool.clone()),
                config.store.retry.clone(),
                config.store.timeout,
            );
            (
                Arc::new(store) as Arc<dyn TransactionStore>,
                Arc::new(PgDeadLetterSink::new(pool.clone())) as Arc<dyn DeadLetterSink>,
                Some(pool),
            )
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store and log dead-letter sink");
            let store = RetryingStore::new(
                MemoryTransactionStore::new(),
                config.store.retry.clone(),
                config.store.timeout,
            );
            (
                Arc::new(store) as Arc<dyn TransactionStore>,
                Arc::new(LogDeadLetterSink) as Arc<dyn DeadLetterSink>,
                None,
            )
        }
    };

    tracing::info!(
        provider = provider.name(),
        dimensions = provider.dimensions(),
        persistent = pool.is_some(),
        "Pipeline components initialized"
    );

    Ok(Components {
        provider,
        store,
        dead_letters,
        pool,
    })
}

pub fn build_ingest_service(config: &Config, components: &Components) -> IngestService {
    let pipeline = EnrichmentPipeline::new(
        components.provider.clone(),
        components.store.clone(),
        components.dead_letters.clone(),
        config.enrichment_settings(),
        Arc::new(PipelineStats::new()),
    );

    IngestService::new(
        Arc::new(pipeline),
        components.dead_letters.clone(),
        config.consumer_settings(),
        PoolSettings {
            workers: config.pipeline.workers,
            queue_capacity: config.pipeline.queue_capacity,
            shutdown_grace: config.pipeline.shutdown_grace,
        },
    )
}

pub struct ValidationReport {
    pub database: Option<bool>,
    pub embedding: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.database.unwrap_or(true) && self.embedding
    }

    pub fn print(&self) {
        println!("\n=== Startup Validation Report ===");
        match self.database {
            Some(ok) => println!("Database Connectivity: {}", status(ok)),
            None => println!("Database Connectivity: skipped (in-memory)"),
        }
        println!("Embedding Provider:    {}", status(self.embedding));

        if !self.errors.is_empty() {
            println!("\nErrors:");
            for error in &self.errors {
                println!("  ❌ {}", error);
            }
        }

        println!("\nOverall Status: {}", if self.is_valid() { "✅ PASS" } else { "❌ FAIL" });
        println!("=================================\n");
    }
}

fn status(ok: bool) -> &'static str {
    if ok { "✅ OK" } else { "❌ FAIL" }
}

/// Probes the configured database and embedding provider once each.
pub async fn validate_environment(config: &Config) -> ValidationReport {
    let mut report = ValidationReport {
        database: None,
        embedding: true,
        errors: Vec::new(),
    };

    if config.database_url.is_some() {
        let result = async {
            let pool = connect_database(config).await?;
            validate_database(&pool).await
        }
        .await;
        report.database = Some(result.is_ok());
        if let Err(e) = result {
            report.errors.push(format!("Database: {:#}", e));
        }
    }

    if let Err(e) = validate_embedding(&config.embedding).await {
        report.embedding = false;
        report.errors.push(format!("Embedding: {:#}", e));
    }

    report
}

async fn validate_database(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to query database")?;

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .context("Failed to check migrations table")?;

    if applied == 0 {
        anyhow::bail!("No migrations applied");
    }

    Ok(())
}

async fn validate_embedding(config: &EmbeddingConfig) -> Result<()> {
    let provider = build_provider(config)?;
    let vector = provider
        .embed("startup validation")
        .await
        .context("Embedding check failed")?;
    if vector.len() != provider.dimensions() {
        anyhow::bail!(
            "provider returned {} dimensions, expected {}",
            vector.len(),
            provider.dimensions()
        );
    }
    Ok(())
}
