use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::sync::watch;

use crate::adapters::{PgDeadLetterSink, PgTransactionStore};
use crate::config::{Config, ProviderKind};
use crate::ports::{DeadLetterPayload, DeadLetterSink, TransactionStore};
use crate::services::{RandomTransactionGenerator, TransactionGenerator};
use crate::startup;
use crate::stream::MemorySource;

#[derive(Parser)]
#[command(name = "fraud-ingest")]
#[command(about = "Fraud Ingest - transaction enrichment pipeline", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Consume the transaction topic and run the pipeline (default)
    Run,

    /// Push synthetic traffic through the full pipeline in-process
    Simulate {
        /// Number of synthetic customers
        #[arg(long, default_value_t = 10)]
        customers: usize,

        /// Number of transactions to generate
        #[arg(long, default_value_t = 100)]
        count: usize,
    },

    /// Print synthetic transactions as JSON lines
    Generate {
        #[arg(long, default_value_t = 10)]
        customers: usize,

        #[arg(long, default_value_t = 100)]
        count: usize,
    },

    /// Transaction management commands
    #[command(subcommand)]
    Tx(TxCommands),

    /// Dead-letter inspection commands
    #[command(subcommand)]
    Dlq(DlqCommands),

    /// Database management commands
    #[command(subcommand)]
    Db(DbCommands),

    /// Configuration validation
    Config,
}

#[derive(Subcommand)]
pub enum TxCommands {
    /// Show a stored transaction
    Show {
        #[arg(value_name = "TX_ID")]
        tx_id: String,
    },

    /// Set the fraud label of a stored transaction
    Label {
        #[arg(value_name = "TX_ID")]
        tx_id: String,

        #[arg(long, action = clap::ArgAction::Set)]
        fraud: bool,
    },
}

#[derive(Subcommand)]
pub enum DlqCommands {
    /// List the most recent dead-letter entries
    List {
        #[arg(short, long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[cfg(feature = "kafka")]
pub async fn handle_run(config: &Config, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    use crate::stream::KafkaSource;

    let components = startup::build_components(config).await?;
    let source = Arc::new(KafkaSource::connect(&config.kafka)?);
    let service = startup::build_ingest_service(config, &components);

    service.run(source, shutdown).await;
    Ok(())
}

#[cfg(not(feature = "kafka"))]
pub async fn handle_run(_config: &Config, _shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    anyhow::bail!(
        "`run` needs the Kafka consumer; rebuild with `--features kafka` or use `simulate`"
    )
}

pub async fn handle_simulate(
    config: &Config,
    customers: usize,
    count: usize,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    if customers == 0 {
        anyhow::bail!("--customers must be greater than 0");
    }

    let components = startup::build_components(config).await?;
    let service = startup::build_ingest_service(config, &components);

    let mut generator = RandomTransactionGenerator::from_entropy();
    let profiles = generator.customers(customers);
    let source = Arc::new(MemorySource::new());
    for i in 0..count {
        let record = generator.generate(&profiles[i % profiles.len()]);
        source.push_json(&record)?;
    }
    source.close();

    tracing::info!(customers, count, "Simulating synthetic traffic");
    let snapshot = service.run(source, shutdown).await;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    println!("Dead-letter rate: {:.2}%", snapshot.dead_letter_rate() * 100.0);
    Ok(())
}

pub fn handle_generate(customers: usize, count: usize) -> anyhow::Result<()> {
    if customers == 0 {
        anyhow::bail!("--customers must be greater than 0");
    }

    let mut generator = RandomTransactionGenerator::from_entropy();
    let profiles = generator.customers(customers);
    for i in 0..count {
        let record = generator.generate(&profiles[i % profiles.len()]);
        println!("{}", serde_json::to_string(&record)?);
    }
    Ok(())
}

pub async fn handle_tx_show(config: &Config, tx_id: &str) -> anyhow::Result<()> {
    let store = PgTransactionStore::new(startup::connect_database(config).await?);

    match store.get(tx_id).await? {
        Some(tx) => {
            println!("{}", serde_json::to_string_pretty(&tx)?);
            Ok(())
        }
        None => {
            tracing::warn!("Transaction {} not found", tx_id);
            anyhow::bail!("Transaction {} not found", tx_id)
        }
    }
}

pub async fn handle_tx_label(config: &Config, tx_id: &str, fraud: bool) -> anyhow::Result<()> {
    let store = PgTransactionStore::new(startup::connect_database(config).await?);

    let Some(tx) = store.get(tx_id).await? else {
        tracing::warn!("Transaction {} not found", tx_id);
        anyhow::bail!("Transaction {} not found", tx_id)
    };

    let outcome = store.upsert(&tx.with_fraud_label(fraud)).await?;
    tracing::info!(transaction_id = tx_id, fraud, ?outcome, "Fraud label set");
    println!("✓ Transaction {} labeled isFraud={}", tx_id, fraud);
    Ok(())
}

pub async fn handle_dlq_list(config: &Config, limit: i64) -> anyhow::Result<()> {
    let sink = PgDeadLetterSink::new(startup::connect_database(config).await?);
    let entries = sink.list(limit).await?;

    if entries.is_empty() {
        println!("No dead-letter entries");
        return Ok(());
    }

    println!(
        "{:<40} {:<22} {:<9} {:<20} {}",
        "Key", "Class", "Attempts", "Failed At", "Reason"
    );
    println!("{}", "-".repeat(110));

    for entry in entries {
        let key = match &entry.payload {
            DeadLetterPayload::Record(tx) => tx.transaction_id.clone(),
            DeadLetterPayload::Raw(_) => entry.dedupe_key.clone(),
        };
        println!(
            "{:<40} {:<22} {:<9} {:<20} {}",
            truncate(&key, 40),
            entry.class,
            entry.attempts,
            entry.failed_at.format("%Y-%m-%d %H:%M:%S"),
            entry.reason
        );
    }

    Ok(())
}

pub async fn handle_db_migrate(config: &Config) -> anyhow::Result<()> {
    let pool = startup::connect_database(config).await?;

    tracing::info!("Running database migrations...");
    crate::db::run_migrations(&pool).await?;

    println!("✓ Database migrations completed");
    Ok(())
}

pub async fn handle_config_validate(config: &Config) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!(
        "  Database URL: {}",
        config
            .masked_database_url()
            .unwrap_or_else(|| "(unset, in-memory)".to_string())
    );
    println!(
        "  Kafka: {} topic={} group={}",
        config.kafka.bootstrap_servers, config.kafka.topic, config.kafka.group_id
    );
    match config.embedding.provider {
        ProviderKind::Hashing => {
            println!("  Embedding: hashing ({} dims)", config.embedding.dimensions)
        }
        ProviderKind::Http => println!(
            "  Embedding: http {} model={} ({} dims)",
            config.embedding.endpoint.as_ref().map(|u| u.as_str()).unwrap_or("-"),
            config.embedding.model,
            config.embedding.dimensions
        ),
    }
    println!(
        "  Pipeline: workers={} queue={} max_deliveries={} grace={:?}",
        config.pipeline.workers,
        config.pipeline.queue_capacity,
        config.pipeline.max_deliveries,
        config.pipeline.shutdown_grace
    );

    let report = startup::validate_environment(config).await;
    report.print();
    if !report.is_valid() {
        anyhow::bail!("Configuration validation failed");
    }

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");
    Ok(())
}

fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        value.to_string()
    } else {
        let head: String = value.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
