use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::signal;
use tracing::{info, warn};

use crate::config::Config;
use crate::dashboard::routes;
use crate::error::Result;
use crate::eventlog::EventStore;
use crate::infra::paths::DataPaths;
use crate::trigger::Notifier;
use crate::voice::VoiceCache;

/// Shared state for the dashboard handlers.
#[derive(Clone)]
pub struct DashboardState {
    pub config: Arc<Config>,
    pub store: Arc<dyn EventStore>,
    pub paths: DataPaths,
    pub voice_cache: Arc<VoiceCache>,
    /// Trigger pipeline; owns the idle probe and the driver set.
    pub notifier: Notifier,
    pub start_time: Instant,
}

impl DashboardState {
    pub fn new(notifier: Notifier, paths: DataPaths, voice_cache: Arc<VoiceCache>) -> Self {
        Self {
            config: notifier.config().clone(),
            store: notifier.store().clone(),
            paths,
            voice_cache,
            notifier,
            start_time: Instant::now(),
        }
    }
}

/// Build the router without binding, so tests can serve it on any listener.
pub fn build_router(state: DashboardState) -> Router {
    routes::build_routes(state)
}

/// Serve the dashboard on `127.0.0.1:port` until Ctrl+C or SIGTERM.
pub async fn serve(state: DashboardState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("dashboard listening on http://{}", listener.local_addr()?);
    eprintln!("Dashboard: http://{addr}  (Ctrl+C to stop)");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("dashboard shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
