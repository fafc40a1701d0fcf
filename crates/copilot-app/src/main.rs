// Copilot entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database
// 4. Build the LLM client
// 5. Serve WebSocket clients until Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use copilot_app::state::AppState;
use copilot_app::ws_server;
use copilot_core::config;
use copilot_core::db::Database;
use copilot_llm::LlmClient;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Copilot starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: port={}, llm endpoint={}",
        config.server.port, config.llm.base_url
    );

    // 3. Open database
    let db = Database::open(&config.db_path).context("failed to open database")?;
    info!("Database opened at {}", config.db_path);

    // 4. Build the LLM client. A disabled client still starts the server;
    // every LLM-backed request then fails with a configuration error.
    let llm_client = LlmClient::from_config(&config);
    match &llm_client {
        LlmClient::Active(client) => info!("LLM client initialized ({})", client.endpoint()),
        LlmClient::Disabled { reason } => info!("LLM client disabled: {reason}"),
    }

    let state = Arc::new(AppState::new(db, Arc::new(llm_client)));

    // 5. Serve until Ctrl+C
    let port = config.server.port;
    let listener = TcpListener::bind(format!("127.0.0.1:{port}"))
        .await
        .with_context(|| format!("failed to bind WebSocket server on port {port}"))?;

    tokio::select! {
        result = ws_server::run(listener, state) => {
            if let Err(e) = result {
                error!("WebSocket server error: {e}");
                return Err(e);
            }
        }
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Ctrl+C received, shutting down");
        }
    }

    info!("Copilot shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to `logs/copilot.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("copilot.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("copilot=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
