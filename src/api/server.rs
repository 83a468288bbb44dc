//! HTTP server lifecycle: bind, spawn, graceful shutdown.

use std::net::SocketAddr;

use tokio::sync::oneshot;

use crate::api::router::api_router;
use crate::api::types::ApiContext;

/// Handle to a running API server.
pub struct ApiServer {
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: tokio::task::JoinHandle<()>,
}

impl ApiServer {
    /// Signal shutdown and wait for the server task to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            tracing::info!("API server shutdown signal sent");
        }
        let _ = self.join.await;
    }
}

/// Bind the listener, build the router, and spawn the server in a
/// background task. Port 0 picks an ephemeral port, used by tests.
pub async fn start_server(ctx: ApiContext, addr: SocketAddr) -> Result<ApiServer, std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "API server listening");

    let app = api_router(ctx);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let join = tokio::spawn(async move {
        let server = axum::serve(listener, app).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = server.await {
            tracing::error!(error = %e, "API server exited with error");
        }
    });

    Ok(ApiServer {
        addr,
        shutdown_tx: Some(shutdown_tx),
        join,
    })
}
