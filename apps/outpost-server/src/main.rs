//! Outpost server binary.
//!
//! Usage: `outpost-server [config.toml]`. Without a path the defaults are
//! used and `reload` is unavailable. The operator console reads stdin.

use std::path::PathBuf;
use std::time::Duration;

use outpost::prelude::*;
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

/// How long connection tasks get to flush their `Disconnect` records.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn config_path<I: IntoIterator<Item = String>>(args: I) -> Option<PathBuf> {
    args.into_iter().nth(1).map(PathBuf::from)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let path = config_path(std::env::args());
    let config = match &path {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };

    let server = OutpostServer::builder().config(config).build().await?;
    let state = server.state();
    let accept = tokio::spawn(server.run());

    let mut console = Console::new(state.clone());
    if let Some(path) = path {
        console = console.with_config_path(path);
    }
    console
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await?;

    // End of input without `exit` still stops the server.
    if !state.is_shutting_down() {
        state.registry().lock().await.disconnect_all(DisconnectReason::Closing);
        state.begin_shutdown();
    }
    accept.await??;
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    Ok(())
}
