use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use showrun_api::config::ServerConfig;
use showrun_api::{router, state};
use showrun_engine::QueryEngine;

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "showrun_api=debug,showrun_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "configuration loaded");

    // --- Engine ---
    let engine = Arc::new(QueryEngine::with_builtins(config.engine.clone()));
    tracing::info!(
        max_concurrent_analyses = config.engine.max_concurrent_analyses,
        provider_timeout = ?config.engine.provider_timeout,
        "query engine ready"
    );

    // --- Router ---
    let app = router::build_app_router(
        AppState {
            engine: Arc::clone(&engine),
            config: Arc::new(config.clone()),
        },
        &config,
    );

    // --- Serve ---
    let addr = SocketAddr::new(
        config.host.parse().expect("HOST is not a valid IP address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("could not bind listener");
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server crashed");

    // --- Drain ---
    // In-flight queries run on background tasks that die with the
    // process, so give them a bounded window to reach a terminal state.
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, drain_active_queries(&engine))
        .await
        .is_err()
    {
        let active = engine.active_query_count().await;
        tracing::warn!(active, "drain window elapsed with queries still active");
    }

    tracing::info!("shutdown complete");
}

/// Poll until every registered query has reached a terminal status.
async fn drain_active_queries(engine: &QueryEngine) {
    loop {
        if engine.active_query_count().await == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// Resolve when the process is asked to stop.
///
/// Listens for Ctrl-C everywhere and additionally for SIGTERM on Unix,
/// which is what container runtimes and process managers send.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Ctrl-C handler installation failed");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation failed")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    let signal = tokio::select! {
        () = ctrl_c => "SIGINT",
        () = sigterm => "SIGTERM",
    };
    tracing::info!(signal, "shutting down");
}
