//! Relay Gateway entry point
//!
//! Run with:
//! ```bash
//! cargo run -p relay-gateway
//! cargo run -p relay-gateway -- --migrate
//! ```
//!
//! Configuration is loaded from environment variables.

use relay_common::{try_init_tracing_with_config, AppConfig, TracingConfig};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Run the server
    if let Err(e) = run().await {
        error!(error = %e, "Gateway failed to start");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = AppConfig::from_env().inspect_err(|e| {
        eprintln!("Failed to load configuration: {e}");
    })?;

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::for_environment(config.app.env)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    info!(
        app = %config.app.name,
        env = ?config.app.env,
        port = config.gateway.port,
        "Configuration loaded"
    );

    if std::env::args().skip(1).any(|arg| arg == "--migrate") {
        let dir = config
            .database
            .migrations_dir
            .clone()
            .unwrap_or_else(|| relay_db::pool::MIGRATIONS_DIR.to_string());
        let pool = relay_db::create_pool(&config.database).await?;
        relay_db::run_migrations(&pool, &dir).await?;
        info!(dir = %dir, "Migrations applied");
        return Ok(());
    }

    // Run the gateway server
    relay_gateway::run(config).await?;

    Ok(())
}
