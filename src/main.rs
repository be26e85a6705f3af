//! Pitwall
//!
//! Batch jobs building an F1 session data warehouse (flat CSV tables) and a
//! leakage-safe feature table for race outcome models.

mod append;
mod cli;
mod config;
mod error;
mod features;
mod normalize;
mod schema;
mod session;
mod standings;
mod store;
mod upsert;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands};
use crate::session::SessionKind;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pitwall=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Race { year } => cli::run_ingest(cli.staging, cli.sessions, year, SessionKind::Race),
        Commands::Sprint { year } => {
            cli::run_ingest(cli.staging, cli.sessions, year, SessionKind::Sprint)
        }
        Commands::Qualifying { year } => {
            cli::run_ingest(cli.staging, cli.sessions, year, SessionKind::Qualifying)
        }
        Commands::Standings => cli::run_standings(cli.staging, cli.sessions),
        Commands::Prepare { output } => cli::run_prepare(cli.staging, cli.sessions, output),
    }
}
