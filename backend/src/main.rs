use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use wheel_ledger::clock::SystemClock;
use wheel_ledger::config::{LedgerConfig, StoreKind};
use wheel_ledger::store::{MemoryPlayerStore, PgPlayerStore, PlayerStore};
use wheel_ledger::{create_router, logging, AppState, LedgerService};

async fn open_store(config: &LedgerConfig) -> Result<Arc<dyn PlayerStore>, Box<dyn std::error::Error>> {
    match config.store {
        StoreKind::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or("DATABASE_URL must be set")?;
            let store =
                PgPlayerStore::connect(url, config.db_max_connections, config.store_timeout).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        StoreKind::Memory => {
            info!("Using in-memory player store; records will not survive a restart");
            Ok(Arc::new(MemoryPlayerStore::new(config.store_timeout)))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::from_path(".env").ok();
    logging::setup()?;

    let config = LedgerConfig::from_env()?;
    info!(
        "Daily spin quota {} (names {}..={} chars)",
        config.policy.daily_quota, config.policy.names.min_length, config.policy.names.max_length
    );

    let store = open_store(&config).await?;
    let ledger = LedgerService::new(store.clone(), Arc::new(SystemClock), config.policy.clone());
    let app = create_router(AppState { ledger });

    let listener = TcpListener::bind(config.listen_addr).await?;
    info!("listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!("Ledger stopped");
    Ok(())
}
