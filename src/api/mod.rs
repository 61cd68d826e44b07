//! REST API over a running scenario.
//!
//! Provides:
//! - `GET /network`: snapshot of the network directory
//! - `GET /notifications`: notification history with optional range filtering
//! - `POST /breakers/{id}`: queue a breaker command for the active run
//!
//! Handlers never mutate the network; breaker commands go through the
//! scheduler's command channel.

mod handlers;
mod types;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use crate::network::SharedNetwork;
use crate::sim::{CommandSender, NotificationLog};

/// Handles shared across all request handlers.
///
/// Reads are eventually-consistent snapshots of state owned by the run.
pub struct AppState {
    /// Network mutated by the running scenario.
    pub network: SharedNetwork,
    /// History of delivered notifications.
    pub log: NotificationLog,
    /// Command channel into the scheduler.
    pub commands: CommandSender,
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/network", get(handlers::get_network))
        .route("/notifications", get(handlers::get_notifications))
        .route("/breakers/{id}", post(handlers::post_breaker))
        .with_state(state)
}

/// Binds to the given address and serves the API until the server fails.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server exits
/// with an error.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> io::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, app).await
}
