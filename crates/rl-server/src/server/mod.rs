//! HTTP listener and routes
//!
//! One axum router serves the admin API, the device channel upgrade at
//! `/ws` and, when `static_dir` is configured, the admin panel.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::push;
use crate::state::ServerState;

/// Build the application router
pub fn router(server: Arc<ServerState>) -> Router {
    let app = Router::new()
        .route("/api/status", get(api::status))
        .route("/api/lock", post(api::lock))
        .route("/api/unlock", post(api::unlock))
        .route("/api/message", post(api::message))
        .route("/api/devices", get(api::devices))
        .route("/ws", get(push::ws_handler))
        .with_state(Arc::clone(&server));

    let app = match &server.config.static_dir {
        Some(dir) => {
            tracing::info!("Serving admin panel from {:?}", dir);
            let index = ServeFile::new(dir.join("index.html"));
            app.fallback_service(ServeDir::new(dir).fallback(index))
        }
        None => app,
    };

    app.layer(TraceLayer::new_for_http())
}

/// Bind `bind_address` and serve until the shutdown token is cancelled
pub async fn serve(server: Arc<ServerState>) -> Result<()> {
    let listener = TcpListener::bind(&server.config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", server.config.bind_address))?;
    serve_on(listener, server).await
}

/// Serve on an already bound listener
pub async fn serve_on(listener: TcpListener, server: Arc<ServerState>) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    tracing::info!("Listening on {}", addr);

    let shutdown = server.shutdown.clone();
    axum::serve(
        listener,
        router(server).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .context("HTTP server failed")?;

    tracing::info!("Listener on {} stopped", addr);
    Ok(())
}
