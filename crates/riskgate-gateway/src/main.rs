//! riskgate gateway binary.
//!
//! - Config: `RISKGATE_CONFIG` or `riskgate.yaml` (strict parsing + validate)
//! - Logging: `RUST_LOG`, default `info`
//! - Graceful shutdown: readiness flips to draining, maintenance stops, then
//!   in-flight requests finish

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use riskgate_gateway::{app_state, config, maintenance, router};

const DEFAULT_CONFIG: &str = "riskgate.yaml";

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "riskgate-gateway failed");
        std::process::exit(1);
    }
}

async fn run() -> riskgate_core::Result<()> {
    let path = std::env::var("RISKGATE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG.to_string());
    let cfg = config::load_from_file(&path)?;
    let listen: SocketAddr = cfg.gateway.listen.parse().map_err(|e| {
        riskgate_core::RiskGateError::BadRequest(format!("gateway.listen must be a valid SocketAddr: {e}"))
    })?;
    let every = Duration::from_millis(cfg.gateway.maintenance_interval_ms);

    let state = app_state::AppState::new(cfg)?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = maintenance::spawn(state.clone(), every, shutdown_rx);

    let app = router::build_router(state.clone());

    tracing::info!(%listen, config = %path, "riskgate-gateway starting");
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| riskgate_core::RiskGateError::Internal(format!("bind {listen}: {e}")))?;

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(state, shutdown_tx))
        .await
        .map_err(|e| riskgate_core::RiskGateError::Internal(format!("server failed: {e}")))?;

    let _ = sweeper.await;
    Ok(())
}

async fn shutdown_signal(state: app_state::AppState, shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
    state.set_draining();
    let _ = shutdown_tx.send(true);
}
