//! HTTP listener
//!
//! Binds a TCP socket and serves the axum router until shutdown.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::error::Result;

use super::Server;

impl Server {
    /// Run the server
    ///
    /// This method blocks until the listener fails.
    pub async fn serve(&self) -> Result<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Run the server with graceful shutdown
    ///
    /// When `shutdown` resolves the hub is shut down, which ends every open
    /// event stream, and the listener returns once in-flight requests finish.
    pub async fn serve_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.config().bind_addr).await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve_listener<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            addr = %addr,
            mount = %self.config().mount_path,
            "SSE server listening"
        );

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        let server = self.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
                server.shutdown().await;
            })
            .await?;

        tracing::info!(addr = %addr, "SSE server stopped");
        Ok(())
    }
}
