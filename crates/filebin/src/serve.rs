//! Server loop: bind, sweep the staging area, serve until signalled.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use binconf::FilebinConfig;
use blobstore::{FileStore, StoreConfig};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::web::{router, WebState};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub addr: String,
    /// URL prefix the blob routes are nested under
    pub mount: String,
    pub store: StoreConfig,
}

impl ServeConfig {
    pub fn from_config(config: &FilebinConfig) -> Self {
        let store = StoreConfig::with_root(&config.paths.data_dir)
            .size_limit(config.limits.size_limit)
            .max_uploads(config.limits.max_uploads)
            .io_timeout(Duration::from_secs(config.limits.io_timeout_secs));

        Self {
            addr: config.bind.addr.clone(),
            mount: config.bind.mount.clone(),
            store,
        }
    }
}

/// Run the server until SIGINT or SIGTERM.
pub async fn run(config: ServeConfig) -> Result<()> {
    info!("filebin starting");

    let listener = TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;

    serve_listener(listener, config, shutdown_signal()).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_listener<F>(listener: TcpListener, config: ServeConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let store = FileStore::new(config.store.clone());
    store
        .ensure_dirs()
        .await
        .with_context(|| format!("Failed to prepare {}", config.store.root.display()))?;

    // Nothing can be in flight yet, so anything in temp/ is a leftover.
    let swept = store
        .sweep_staging()
        .await
        .context("Failed to sweep staging area")?;
    if swept > 0 {
        info!(swept, "removed leftover staging files");
    }

    let app = router(WebState::new(store), &config.mount);
    let addr = listener.local_addr().context("Failed to read listener address")?;

    info!(
        %addr,
        mount = %config.mount,
        root = %config.store.root.display(),
        size_limit = config.store.size_limit,
        max_uploads = config.store.max_uploads,
        "filebin ready"
    );
    info!("   Health: GET http://{}/health", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to setup SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
