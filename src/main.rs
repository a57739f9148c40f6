//! Bounty Board Server
//!
//! Serves bounty, entry and award operations over HTTP

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bounty_board::{BountyBoard, Config, Database, HttpLedger, MemoryLedger, PaymentLedger};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Bounty Board Server");

    let config_path =
        std::env::var("BOUNTY_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::load_from(&config_path)?;

    let db = Arc::new(
        Database::open(&config.database, config.transactions)
            .with_context(|| format!("Failed to open {}", config.database.path.display()))?,
    );

    // The blocking ledger client must be built and dropped outside the runtime
    let ledger: Arc<dyn PaymentLedger> = match config.ledger_endpoint() {
        Some(endpoint) => {
            info!("Using payment ledger at {}", endpoint);
            Arc::new(HttpLedger::new(
                endpoint,
                Duration::from_secs(config.ledger.timeout_secs),
            )?)
        }
        None => {
            warn!("No ledger endpoint configured; using in-process ledger");
            Arc::new(MemoryLedger::new(config.ledger.system_account_id))
        }
    };

    let board = Arc::new(
        BountyBoard::new(db, Arc::clone(&ledger))
            .with_system_account(config.ledger.system_account_id),
    );

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(bounty_board::server::run_server(
        &config.server.host,
        config.server.port,
        board,
    ));
    drop(runtime);
    drop(ledger);

    result
}
