//! TCP transport for the HTTP API.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::TcpListener;

use super::types::AppState;
use crate::error::AppError;

/// Configuration for the HTTP listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Address to bind; port `0` picks a free port.
    pub bind_address: SocketAddr,
}

impl TransportConfig {
    /// Listen on `bind_address`.
    #[must_use]
    pub const fn new(bind_address: SocketAddr) -> Self {
        Self { bind_address }
    }
}

/// Serve the API until Ctrl-C.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the address cannot be bound or the server
/// fails.
pub async fn serve(state: AppState, config: &TransportConfig) -> Result<(), AppError> {
    let listener = TcpListener::bind(config.bind_address).await?;
    serve_with_shutdown(listener, state, shutdown_signal()).await
}

/// Serve the API on an already bound listener until `shutdown` resolves.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the server fails.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    tracing::info!(transport = "http", bind = %address, "listening");

    axum::serve(listener, super::router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}
