//! Wallet ledger server binary

use anyhow::Context;
use wallet_ledger::{Config, Ledger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = match std::env::var("WALLET_LEDGER_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        Err(_) => Config::from_env().context("loading config from environment")?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        data_dir = %config.data_dir.display(),
        "Starting wallet ledger"
    );

    let ledger = Ledger::open(config).await.context("opening ledger")?;

    let stats = ledger.stats().await?;
    tracing::info!(
        wallets = stats.total_wallets,
        transactions = stats.total_transactions,
        "Ledger opened"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down wallet ledger");
    Ok(())
}
