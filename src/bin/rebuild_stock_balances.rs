//! Operator script that wipes and recomputes the stock balance projections
//! from the ledger. Intended for maintenance windows with no live ledger
//! writers; the service detects concurrent writes and exits non-zero.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use franchise_stock_api as api;

#[derive(Parser, Debug)]
#[command(
    name = "rebuild-stock-balances",
    about = "Recompute StockBalance and StockBatchBalance from the stock ledger"
)]
struct Args {
    /// Database URL; defaults to the configured APP__DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,

    /// Run migrations before rebuilding (useful on fresh replicas)
    #[arg(long, default_value_t = false)]
    migrate: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = match api::config::load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let database_url = args.database_url.unwrap_or_else(|| cfg.database_url.clone());

    let pool = match api::db::establish_connection(&database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("failed to connect to database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.migrate {
        if let Err(e) = api::db::run_migrations(&pool).await {
            error!("failed to run migrations: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let ledger = api::services::stock_ledger::StockLedgerService::new(Arc::new(pool));

    match ledger.rebuild_balances().await {
        Ok(summary) => {
            info!(
                ledger_rows = summary.ledger_rows,
                balance_rows = summary.balance_rows,
                batch_rows = summary.batch_rows,
                "rebuild complete"
            );
            println!(
                "rebuilt {} balance rows and {} batch rows from {} ledger rows",
                summary.balance_rows, summary.batch_rows, summary.ledger_rows
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("rebuild failed: {}", e);
            eprintln!("rebuild failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
