//! `GatewayServer` — Axum HTTP server wiring.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::api;
use crate::shutdown::ShutdownCoordinator;
use crate::state::AppState;

/// The gateway HTTP server.
pub struct GatewayServer {
    state: AppState,
    shutdown: Arc<ShutdownCoordinator>,
}

impl GatewayServer {
    /// Create a server over application state.
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            shutdown: Arc::new(ShutdownCoordinator::new()),
        }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Bind and serve. Returns the bound address and the server task.
    #[instrument(skip_all, fields(host = %self.state.settings().host, port = self.state.settings().port))]
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
        let settings = self.state.settings();
        let addr = format!("{}:{}", settings.host, settings.port);
        let listener = TcpListener::bind(&addr).await?;
        let bound_addr = listener.local_addr()?;
        info!(addr = %bound_addr, "gateway listening");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    token.cancelled().await;
                    info!("server shutdown initiated");
                })
                .await;
            info!("server shutdown complete");
        });

        Ok((bound_addr, handle))
    }
}
