//! Kinesis Emulator Server
//!
//! Main entry point. Boot order is leaf-first: configuration, then the
//! engine (fresh or restored from a snapshot), then its scheduler, then the
//! pre-initialized streams, and finally the listeners. Shutdown reverses it:
//! the listeners drain, the scheduler and persistence loops stop, and a
//! final snapshot is written when persistence is enabled.
//!
//! ## Quick start
//! ```bash
//! # Serve plain HTTP on 4568 with two ready-made streams
//! INITIALIZE_STREAMS="orders:4,clicks:1" cargo run -p kinesis-mock-server
//!
//! # Durable state across restarts
//! SHOULD_PERSIST_DATA=true PERSIST_PATH=./data/kinesis.snapshot \
//!     cargo run -p kinesis-mock-server
//! ```
//!
//! Point any Kinesis client at `http://localhost:4568` with dummy
//! credentials; the region is read from the SigV4 credential scope.

use kinesis_mock_engine::{Cache, Snapshot, SystemClock};
use kinesis_mock_server::persistence::spawn_persistence_loop;
use kinesis_mock_server::routes::{create_router, AppState};
use kinesis_mock_server::{config::ServerConfig, init, tls};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone())),
        )
        .init();

    // Engine: restore from the snapshot file when configured, else fresh.
    let clock = Arc::new(SystemClock);
    let cache = if config.persist.should_persist && config.persist.load_if_exists {
        match Snapshot::load_if_exists(&config.persist.path).await? {
            Some(snapshot) => Cache::restore(config.engine.clone(), clock, snapshot),
            None => Cache::new(config.engine.clone(), clock),
        }
    } else {
        Cache::new(config.engine.clone(), clock)
    };

    // Scheduler: the loop that fires delayed transitions.
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let scheduler_handle = tokio::spawn(cache.clone().run_scheduler(shutdown_rx.clone()));

    // Persistence loop (also writes the final snapshot on shutdown).
    let persistence_handle = if config.persist.should_persist {
        Some(spawn_persistence_loop(
            cache.clone(),
            config.persist.clone(),
            shutdown_rx.clone(),
        ))
    } else {
        None
    };

    // Streams the configuration wants ready before serving.
    init::initialize_streams(&cache, &config.initialize_streams).await;

    let router = create_router(AppState {
        cache: cache.clone(),
    });

    tracing::info!(
        region = %config.engine.default_region,
        account = %config.engine.account_id,
        plain_port = config.plain_port,
        "kinesis-mock starting"
    );

    let handle = axum_server::Handle::new();

    // Signal handler: flip the shutdown watch and drain the listeners.
    {
        let handle = handle.clone();
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                tokio::signal::ctrl_c()
                    .await
                    .expect("failed to install Ctrl+C handler");
            };

            #[cfg(unix)]
            let terminate = async {
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to install signal handler")
                    .recv()
                    .await;
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    tracing::info!("received SIGINT, shutting down");
                }
                _ = terminate => {
                    tracing::info!("received SIGTERM, shutting down");
                }
            }

            let _ = shutdown_tx.send(true);
            handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });
    }

    // Plain listener, plus TLS when both PEM paths are configured.
    let plain_addr = SocketAddr::from(([0, 0, 0, 0], config.plain_port));
    let plain_server = {
        let router = router.clone();
        let handle = handle.clone();
        async move {
            axum_server::bind(plain_addr)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        }
    };

    match (&config.tls_cert_path, &config.tls_key_path) {
        (Some(cert), Some(key)) => {
            let rustls = tls::rustls_config(cert, key)?;
            let tls_addr = SocketAddr::from(([0, 0, 0, 0], config.tls_port));
            tracing::info!(tls_port = config.tls_port, "TLS listener enabled");
            let tls_server = {
                let router = router.clone();
                let handle = handle.clone();
                async move {
                    axum_server::bind_rustls(tls_addr, rustls)
                        .handle(handle)
                        .serve(router.into_make_service())
                        .await
                }
            };
            let (plain_result, tls_result) = tokio::join!(plain_server, tls_server);
            plain_result?;
            tls_result?;
        }
        (None, None) => plain_server.await?,
        _ => {
            return Err(
                "TLS_CERT_PATH and TLS_KEY_PATH must be set together to enable TLS".into(),
            );
        }
    }

    // Listeners are drained; stop the background loops.
    let _ = shutdown_tx.send(true);
    if let Some(handle) = persistence_handle {
        let _ = handle.await;
    }
    let _ = scheduler_handle.await;

    tracing::info!("kinesis-mock shut down gracefully");
    Ok(())
}
