// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use anyhow::{Context, Result};
use api_server::app::{create_router, API_PREFIX, VERSION};
use api_server::config::ServerConfig;
use api_server::routes::{module_routes, user_routes};
use api_server::services::body_parser::BodyParserConfig;
use api_server::services::logging::init_tracing;
use api_server::services::upstream::UpstreamClient;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = ServerConfig::from_env()?;

    let auth_client = UpstreamClient::new(
        config.auth_service_url.clone(),
        config.upstream_timeout,
        config.body_limit_bytes,
    )?;
    let modules = module_routes(user_routes(auth_client)).context("Invalid route table")?;

    let prefixes: Vec<&str> = modules.paths().collect();
    tracing::info!(
        auth_service_url = %config.auth_service_url,
        body_limit_bytes = config.body_limit_bytes,
        upstream_timeout_secs = config.upstream_timeout.as_secs(),
        prefixes = ?prefixes,
        api_prefix = API_PREFIX,
        "Configuration loaded"
    );

    let app = create_router(
        modules,
        BodyParserConfig {
            limit: config.body_limit_bytes,
        },
    );

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("api-server v{} listening on {}", VERSION, addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
