// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{sync::Arc, time::Duration};

use axum_server::{tls_rustls::RustlsConfig, Handle};
use biddrop_wallet_auth::{
    api::router,
    auth::ChallengeSweeper,
    config::{ConfigError, ServerConfig, LOG_FORMAT_ENV},
    state::AppState,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("TLS setup failed: {0}")]
    Tls(String),

    #[error("server failed: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        error!(error = %e, "auth server stopped");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    }
}

async fn run() -> Result<(), StartupError> {
    let config = ServerConfig::from_env()?;
    let addr = config.bind_addr()?;

    if config.uses_dev_secret() {
        warn!("JWT_SECRET is not set, using the development secret; do not run this in production");
    }

    let state = AppState::new(&config);
    let shutdown = CancellationToken::new();
    let sweeper = tokio::spawn(
        ChallengeSweeper::new(Arc::clone(&state.challenges)).run(shutdown.clone()),
    );
    let app = router(state);

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone(), shutdown.clone()));

    match &config.tls {
        Some(tls) => {
            // Must happen before any TLS config is built.
            rustls::crypto::ring::default_provider()
                .install_default()
                .map_err(|_| StartupError::Tls("failed to install rustls crypto provider".into()))?;
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(|e| StartupError::Tls(format!("failed to load {}: {e}", tls.cert)))?;

            info!(%addr, "auth server listening on https (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!(%addr, "auth server listening on http (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    shutdown.cancel();
    let _ = sweeper.await;
    info!("auth server shut down");
    Ok(())
}

async fn shutdown_signal(handle: Handle<std::net::SocketAddr>, shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received");
    shutdown.cancel();
    handle.graceful_shutdown(Some(GRACEFUL_SHUTDOWN_TIMEOUT));
}
