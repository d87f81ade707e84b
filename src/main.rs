use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fraud_ingest::cli::{self, Cli, Commands, DbCommands, DlqCommands, TxCommands};
use fraud_ingest::config::{Config, LogFormat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    init_tracing(config.log_format);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => cli::handle_run(&config, shutdown_signal()).await,
        Commands::Simulate { customers, count } => {
            cli::handle_simulate(&config, customers, count, shutdown_signal()).await
        }
        Commands::Generate { customers, count } => cli::handle_generate(customers, count),
        Commands::Tx(TxCommands::Show { tx_id }) => cli::handle_tx_show(&config, &tx_id).await,
        Commands::Tx(TxCommands::Label { tx_id, fraud }) => {
            cli::handle_tx_label(&config, &tx_id, fraud).await
        }
        Commands::Dlq(DlqCommands::List { limit }) => cli::handle_dlq_list(&config, limit).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so `generate` output stays clean on stdout.
    match format {
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}

/// Flips to true on ctrl-c.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = tx.send(true);
    });
    rx
}
