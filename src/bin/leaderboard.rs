//! Offline leaderboard report.
//!
//! Reads the persisted account table and writes a markdown leaderboard to
//! stdout. Takes the config file path as an optional argument, defaulting
//! to the standard location. Display names need the chat platform, so
//! this report falls back to member ids; the in-chat leaderboard rendered
//! by the platform glue resolves real names.
//!
//! All tracing output goes to stderr so stdout stays a clean report.

use pairup::config::PairupConfig;
use pairup::leaderboard::{render_markdown, standings};
use pairup::ledger::Ledger;
use pairup::resets::ResetCycle;
use pairup::storage::JsonFileStore;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(PairupConfig::default_config_path, PathBuf::from);

    tracing::info!(config = %config_path.display(), "loading configuration");
    let config = PairupConfig::from_file(&config_path)?;
    config.validate()?;

    let accounts_path = config_path.with_file_name("accounts.json");
    let cycle = ResetCycle::new(config.reset.anchor, config.reset.interval_secs);
    let mut ledger = Ledger::new(Box::new(JsonFileStore::new(accounts_path)), cycle);
    ledger.load().await?;

    let entries = standings(&ledger.list_accounts(), |_| None);
    print!("{}", render_markdown(&entries, &config.currency));

    Ok(())
}
