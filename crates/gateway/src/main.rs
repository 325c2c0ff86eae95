//! Gateway service entry point.

use anyhow::Result;
use chrono::Utc;
use common::{
    AccountManager, AlgoManager, ExchangeConnectivityManager, GlobalOrderBook, MarketDataManager,
    PositionManager, SecurityManager,
};
use gateway::{create_router, AppState, Engines, SessionRegistry, TokenStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting session gateway");

    // Read configuration from environment
    let port: u16 = env::var("GATEWAY_PORT")
        .unwrap_or_else(|_| "9111".to_string())
        .parse()
        .expect("GATEWAY_PORT must be a number");
    let metrics_port: u16 = env::var("METRICS_PORT")
        .unwrap_or_else(|_| "9112".to_string())
        .parse()
        .expect("METRICS_PORT must be a number");
    let algo_dir = PathBuf::from(env::var("ALGO_DIR").unwrap_or_else(|_| "algos".to_string()));
    let store_dir = PathBuf::from(env::var("STORE_DIR").unwrap_or_else(|_| "store".to_string()));

    info!("Configuration:");
    info!("  GATEWAY_PORT: {}", port);
    info!("  METRICS_PORT: {}", metrics_port);
    info!("  ALGO_DIR: {}", algo_dir.display());
    info!("  STORE_DIR: {}", store_dir.display());

    // Start Prometheus metrics server
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], metrics_port))
        .install()
        .expect("Failed to start Prometheus exporter");
    info!("Prometheus metrics server started on port {}", metrics_port);

    // Reference data and engine adapters are loaded by the surrounding
    // platform; a standalone gateway starts with empty managers.
    let order_book = Arc::new(GlobalOrderBook::new());
    let shutdown = Arc::new(Notify::new());
    let engines = Arc::new(Engines {
        securities: Arc::new(SecurityManager::new()),
        accounts: Arc::new(AccountManager::new()),
        market_data: Arc::new(MarketDataManager::new()),
        exchange: Arc::new(ExchangeConnectivityManager::new(order_book.clone())),
        algos: Arc::new(AlgoManager::new()),
        positions: Arc::new(PositionManager::new(
            Utc::now().format("%Y-%m-%d").to_string(),
        )),
        order_book,
        tokens: Arc::new(TokenStore::new()),
        algo_dir,
        store_dir,
        start_time: Utc::now().timestamp(),
        shutdown: shutdown.clone(),
    });

    let registry = Arc::new(SessionRegistry::new());
    let state = Arc::new(AppState { registry, engines });
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Gateway listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await?;

    info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: Arc<Notify>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
        _ = shutdown.notified() => info!("Shutdown requested by admin"),
    }
}
