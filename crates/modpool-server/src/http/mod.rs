//! HTTP sync service using axum.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::ServerError;
use crate::server::AppState;

pub mod handlers;

/// Create the sync router with all four protocol surfaces.
///
/// Catalog and manifest bodies are gzip streams by protocol (the
/// clients expect `.gz` payloads regardless of `Accept-Encoding`),
/// so compression happens inside the handlers, not in a layer.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/repos.gz", get(handlers::handle_repos))
        .route("/{shortname}/versions.gz", get(handlers::handle_versions))
        .route(
            "/{shortname}/packages/{filename}",
            get(handlers::handle_package),
        )
        .route("/{shortname}/streamer.cgi", post(handlers::handle_streamer))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// # Errors
///
/// Returns `ServerError` if the listener fails to bind or the server
/// terminates with an error.
pub async fn start_server(bind_addr: SocketAddr, state: Arc<AppState>) -> Result<(), ServerError> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .map_err(|source| ServerError::BindFailed {
            addr: bind_addr,
            source,
        })?;

    tracing::info!("Sync service listening on {}", bind_addr);

    axum::serve(listener, app).await.map_err(ServerError::Serve)
}
