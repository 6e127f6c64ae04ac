mod config;
mod error;
mod events;
mod hub;
mod routes;
mod state;
mod ws;

use tokio::net::TcpListener;

use config::{generate_config_template, Config};
use state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "agora_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "agora_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Agora server v{} starting", env!("CARGO_PKG_VERSION"));

    let chat = config.chat.clone().unwrap_or_default();
    let state = AppState::new(&config);

    // Background idle-session reaper
    hub::reaper::spawn_idle_reaper(
        state.clone(),
        chat.reaper_interval_secs,
        chat.idle_timeout_secs,
    );

    let app = routes::build_router(state);

    let listener = TcpListener::bind(format!("{}:{}", config.bind_address, config.port)).await?;
    tracing::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
