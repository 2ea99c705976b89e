use std::sync::Arc;

use server::auth::{AuthValidator, BearerTokenValidator, NullAuthValidator};
use server::config::Config;
use server::state::AppState;
use server::{db, sweeper};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .init();

    info!("connecting to database...");
    let pool = db::create_pool(&config.database_url).await;
    db::run_migrations(&pool).await;
    info!("migrations applied");

    let auth: Arc<dyn AuthValidator> = match &config.service_token {
        Some(token) => Arc::new(BearerTokenValidator::new(token)),
        None => {
            warn!("STREAM_SERVICE_TOKEN unset, auth is disabled (dev only)");
            Arc::new(NullAuthValidator)
        }
    };

    let bind_addr = config.bind_addr.clone();
    let sweep_interval = config.sweep_interval;
    let state = AppState::new(pool, config, auth);

    tokio::spawn(sweeper::run(state.clone(), sweep_interval));

    let router = server::build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind");
    info!(addr = %bind_addr, "server listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
    info!("server shut down gracefully");
}

/// Waits for SIGTERM or Ctrl-C (SIGINT) and returns to trigger graceful shutdown.
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("received Ctrl+C, shutting down"); },
        _ = terminate => { info!("received SIGTERM, shutting down"); },
    }
}
