//! Stanza Server entry point
//!
//! Run with:
//! ```bash
//! cargo run -p stanza-gateway
//! ```
//!
//! Configuration is loaded from environment variables.

use stanza_common::{try_init_tracing, AppConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Initialize tracing
    if let Err(e) = try_init_tracing() {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    // Run the server
    if let Err(e) = run().await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting Stanza Server...");

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        error!(error = %e, "Failed to load configuration");
        e
    })?;

    info!(
        env = ?config.app.env,
        address = %config.http.address(),
        storage = ?config.storage.backend,
        modules = ?config.modules.enabled,
        "Configuration loaded"
    );

    // Run the server
    stanza_gateway::run(config).await?;

    Ok(())
}
