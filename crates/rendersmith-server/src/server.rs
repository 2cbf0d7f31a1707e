//! HTTP server lifecycle

use crate::api::{router, AppState};
use crate::config::ServerConfig;
use crate::error::{CliError, CliResult};
use rendersmith::RenderService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Run the HTTP service until SIGINT or SIGTERM, then close the browser and
/// drop the video bundle.
pub async fn serve(config: ServerConfig) -> CliResult<()> {
    if config.api_key.is_none() {
        warn!("no API key configured; render routes are unauthenticated");
    }

    let service = Arc::new(RenderService::new(config.service.clone()));

    if config.warmup_video {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            match service.warmup_video().await {
                Ok(()) => info!("video bundle warmed up"),
                Err(e) => error!(error = %e, "video bundle warmup failed"),
            }
        });
    }

    let app = router(
        AppState::new(Arc::clone(&service), config.api_key.clone()),
        config.cors,
    );

    let listener = TcpListener::bind(config.addr)
        .await
        .map_err(|e| CliError::server(format!("failed to bind {}: {e}", config.addr)))?;
    info!(addr = %config.addr, "rendersmith listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    service.shutdown().await;
    served.map_err(|e| CliError::server(e.to_string()))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
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
                error!(error = %e, "failed to listen for SIGTERM");
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
    info!("shutdown signal received");
}
