//! Duka CLI - operator tools that talk to the commerce API.
//!
//! # Usage
//!
//! ```bash
//! # Create the initial catalog categories (existing names are skipped)
//! duka seed categories
//!
//! # Create the sample subcategories under them
//! duka seed subcategories
//!
//! # Wait for an order's M-Pesa payment to settle
//! duka payment watch --order 42 --interval-secs 8 --timeout-secs 120
//! ```
//!
//! # Environment Variables
//!
//! - `DUKA_API_BASE_URL` - Base URL of the commerce API
//! - `DUKA_API_EMAIL` / `DUKA_API_PASSWORD` - Staff account to act as

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::time::Duration;

use clap::{Parser, Subcommand};
use duka_core::OrderId;

mod commands;

#[derive(Parser)]
#[command(name = "duka")]
#[command(author, version, about = "Duka operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create initial catalog data
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Inspect M-Pesa payments
    Payment {
        #[command(subcommand)]
        action: PaymentAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Create the eight top-level categories
    Categories,
    /// Create sample subcategories under existing categories
    Subcategories,
}

#[derive(Subcommand)]
enum PaymentAction {
    /// Poll an order's transaction until it settles
    Watch {
        /// Order id
        #[arg(short, long)]
        order: i64,

        /// Seconds between checks
        #[arg(long, default_value_t = 8)]
        interval_secs: u64,

        /// Give up after this many seconds
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "duka_cli=info,duka_api_client=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CliError> {
    match cli.command {
        Commands::Seed { target } => match target {
            SeedTarget::Categories => commands::seed::categories().await?,
            SeedTarget::Subcategories => commands::seed::subcategories().await?,
        },
        Commands::Payment { action } => match action {
            PaymentAction::Watch {
                order,
                interval_secs,
                timeout_secs,
            } => {
                commands::payment::watch(
                    OrderId::new(order),
                    Duration::from_secs(interval_secs),
                    Duration::from_secs(timeout_secs),
                )
                .await?;
            }
        },
    }
    Ok(())
}
