mod commands;
mod config;
mod error;
mod fetcher;
mod formatter;
mod llm;
mod normalizer;
mod orchestrator;
mod resolver;
mod state;
mod tui;
mod types;

use std::sync::Arc;

use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::Session;
use crate::state::LeagueTable;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // Held until exit so buffered log lines are flushed.
    let _guard = init_logging(&cfg);

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        eprintln!("Fatal error: {e}");
        std::process::exit(1);
    }
}

/// The terminal is owned by the UI, so logs only ever go to a file.
fn init_logging(cfg: &Config) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(&cfg.log_dir) {
        eprintln!("Warning: could not create log directory {} ({e}), logging disabled", cfg.log_dir);
        return None;
    }

    let appender = tracing_appender::rolling::never(&cfg.log_dir, "betcli.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .init();

    Some(guard)
}

async fn run(cfg: Config) -> Result<()> {
    // --- Reference data ---
    let leagues = Arc::new(LeagueTable::load(&cfg.league_data_path));

    // --- Session ---
    let mut session = Session::new(&cfg, leagues)?;
    info!(
        network_id = cfg.network_id,
        api_key = session.has_api_key(),
        "Session ready against {}",
        cfg.overtime_api_url
    );

    // --- Terminal UI (runs until the user quits) ---
    tui::run(&mut session).await?;

    info!("Session closed");
    Ok(())
}
