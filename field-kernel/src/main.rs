use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tracing::{error, info};

use field_kernel::config::load_config;
use field_kernel::http::{build_router, AppState};
use field_kernel::mapping::AssignmentTable;
use field_kernel::metrics::RobotMetrics;
use field_kernel::stats::{ListenerStatus, StatsListener};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let cfg = load_config().await;
    anyhow::ensure!(!cfg.quads.is_empty(), "no quadrants configured");

    let metrics = Arc::new(RobotMetrics::new().context("building metrics registry")?);
    let table = Arc::new(AssignmentTable::new(cfg.quads.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (ready_tx, ready_rx) = oneshot::channel();

    let listener_status = ListenerStatus::new();
    let stats = StatsListener::new(cfg.mqtt.clone(), metrics.clone(), shutdown_rx)
        .with_status(listener_status.clone())
        .on_ready(ready_tx);
    let stats_task = tokio::task::spawn(stats.run());

    tokio::task::spawn(async move {
        if ready_rx.await.is_ok() {
            info!("robot telemetry online");
        }
    });

    let app = build_router(AppState {
        table,
        metrics,
        listener: listener_status,
    });

    let addr: SocketAddr = cfg.listen.parse().context("invalid listen address")?;
    info!(%addr, "admin API listening");
    let http_listener = TcpListener::bind(addr).await.context("binding admin API")?;
    let server = axum::serve(http_listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    tokio::select! {
        res = server => res.context("admin server"),
        res = stats_task => match res.context("stats listener task")? {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(error = %e, "stats listener failed");
                Err(e.into())
            }
        },
    }
}
