//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Initializes the database
//! - Starts the HTTP server with graceful shutdown support

use std::sync::Arc;

use anyhow::Context;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use tunnel_registry::auth::TokenGuard;
use tunnel_registry::config::AppConfig;
use tunnel_registry::database::ServiceStore;
use tunnel_registry::notifier::LogNotifier;
use tunnel_registry::registry::ServiceRegistry;
use tunnel_registry::route::create_app;
use tunnel_registry::state::AppState;

/// Application entry point
///
/// 1. Loads environment variables from .env file
/// 2. Reads configuration (see [`AppConfig`])
/// 3. Opens the embedded database
/// 4. Creates the application state and router
/// 5. Starts the HTTP server with graceful shutdown handling
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tunnel_registry=debug,tower_http=debug")),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;

    let store = ServiceStore::open(&config.database_url)
        .with_context(|| format!("failed to open database {}", config.database_url))?;

    let registry = ServiceRegistry::new(store, config.tunnel.clone(), Arc::new(LogNotifier));
    let guard =
        TokenGuard::new(config.jwt_secret.as_bytes()).with_admin_email(config.admin_email.clone());

    let state = AppState {
        registry,
        guard: Arc::new(guard),
    };

    let app = create_app(state).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        %addr,
        database = %config.database_url,
        base_host = %config.tunnel.base_host(),
        "tunnel registry listening"
    );

    // The server keeps running until it receives SIGTERM or SIGINT
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

/// Resolves when SIGINT (Ctrl+C) or, on Unix, SIGTERM is received
///
/// Open connections are allowed to complete and in-flight database
/// transactions finish before the process exits.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    // On non-Unix systems (Windows), only handle Ctrl+C
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping server");
}
