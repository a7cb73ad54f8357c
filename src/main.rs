use clap::Parser;
use tracing::{info, warn};

use scorecards_sync::config::{CliArgs, SyncConfig};
use scorecards_sync::server;
use scorecards_sync::state::DashboardState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scorecards_sync=info,tower_http=info".into()),
        )
        .init();

    let args = CliArgs::parse();
    info!("Starting scorecards-sync v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Catalog: {}/{}@{}",
        args.repo_owner, args.repo_name, args.catalog_branch
    );

    let token = args.token.clone();
    let config = SyncConfig::from_args(args);
    let port = config.port;
    info!("Settings file: {:?}", config.settings_path);
    match config.fetch_timeout {
        Some(timeout) => info!("Fetch timeout: {:?}", timeout),
        None => info!("Fetch timeout: none"),
    }

    let state = DashboardState::create(config, token.as_deref())?;

    if state.tokens.has_token().await {
        let status = scorecards_sync::auth::revalidate(&state.fetcher).await;
        info!("GitHub token status: {:?}", status);
    } else {
        info!("No GitHub token; catalog reads use the public mirror");
    }

    // Warm the service snapshot without blocking startup
    let warm_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = warm_state.refresh_services().await {
            warn!("Initial service load failed: {}", e);
        }
    });

    // The Actions widget needs the API; without a token it stays closed
    if state.tokens.has_token().await {
        state.open_widget().await;
    }

    let router = server::build_router(state.clone());
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    info!("Dashboard API listening on http://127.0.0.1:{}", port);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.dispose();
    info!("scorecards-sync shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
