//! Bantay bot entry point.
//!
//! Reads platform events as JSON lines on stdin and writes outbound
//! actions as JSON lines on stdout. Logs go to stderr.

use std::process::ExitCode;

use bantay_db::DbManager;
use bantay_server::{JsonLinesMessenger, Router, ServerConfig, ServerError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bantay=info")),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Bantay stopped with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ServerError> {
    info!("Starting Bantay...");

    let config = ServerConfig::load()?;
    let db = DbManager::connect(&config.database).await?;
    let router = Router::new(
        db.client(),
        &config,
        JsonLinesMessenger::new(tokio::io::stdout()),
    );

    // One line at a time keeps events for the same user in order.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Err(e) = router.handle_line(line).await {
            error!(error = %e, "Failed to handle event");
        }
    }

    info!("Input closed, Bantay stopped.");
    Ok(())
}
