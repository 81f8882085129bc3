//! meritx-server — the loyalty-points service binary.
//!
//! Startup sequence:
//!   1. Parse configuration (flags, then env overrides)
//!   2. Connect to Postgres and apply the embedded migrations
//!   3. Start the accrual reconciliation pipeline (worker pool + poller)
//!   4. Serve the HTTP API until SIGINT/SIGTERM, then drain and exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use meritx_accrual::{AccrualClient, Poller, Reconciler, WorkerPool};
use meritx_http::{router, AppState};
use meritx_storage::Db;
use meritx_token::TokenManager;

mod config;

use config::Config;

const SHUTDOWN_DRAIN: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&cfg.log_level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    info!("meritx server starting");

    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    // ── Storage ───────────────────────────────────────────────────────────────
    // The handle carries the root scope: cancellation aborts in-flight
    // queries from both the request path and the reconciler.
    let db = Db::connect(&cfg.database_uri, cancel.clone())
        .await
        .context("initializing storage")?;

    // ── Services ──────────────────────────────────────────────────────────────
    let tokens = TokenManager::new(&cfg.secret, chrono::Duration::hours(cfg.token_ttl_hours));
    let state = AppState::new(db.clone(), tokens, cancel.clone());

    // ── Accrual reconciliation ────────────────────────────────────────────────
    let poller_task = if cfg.accrual_address.is_empty() {
        warn!("accrual system address not configured; reconciliation disabled");
        None
    } else {
        let client =
            AccrualClient::new(&cfg.accrual_address).context("building accrual client")?;
        let reconciler = Arc::new(Reconciler::new(client, db.clone(), cfg.batch_size));
        let poller = Arc::new(Poller::new(Duration::from_secs(cfg.poll_interval_secs)));
        let pool = WorkerPool::start(cfg.rate_limit);
        let poll_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            poller.run(reconciler, &pool, poll_cancel).await;
            pool.stop().await;
        }))
    };

    // ── HTTP server ───────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&cfg.run_address)
        .await
        .with_context(|| format!("binding {}", cfg.run_address))?;
    info!(address = %cfg.run_address, "HTTP server listening");

    let shutdown = cancel.clone();
    let serve = axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await });
    let mut server = tokio::spawn(async move { serve.await });

    let result = tokio::select! {
        res = &mut server => {
            // The server never exits on its own unless something went wrong;
            // take the rest of the process down with it.
            cancel.cancel();
            res.context("server task panicked")?.context("serving HTTP")
        }
        _ = cancel.cancelled() => {
            info!("shutdown signal received; draining connections");
            match tokio::time::timeout(SHUTDOWN_DRAIN, &mut server).await {
                Ok(res) => res.context("server task panicked")?.context("draining HTTP server"),
                Err(_) => {
                    warn!("drain window elapsed with connections still open");
                    server.abort();
                    Ok(())
                }
            }
        }
    };

    if let Some(task) = poller_task {
        let _ = task.await;
    }
    db.close().await;

    info!("shutdown complete");
    result
}

fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                    cancel.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        cancel.cancel();
    });
}
