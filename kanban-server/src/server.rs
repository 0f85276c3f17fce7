/// HTTP server: binds the configured address and serves the API until the
/// process is asked to stop.
use axum::{http::StatusCode, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::api::api_router;
use crate::state::AppState;

/// The full application: health check plus the versioned API, behind CORS.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/api/v1", api_router())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Serve until Ctrl-C or SIGTERM, then let in-flight requests finish.
pub async fn serve(bind_address: &str, port: u16, state: AppState) -> std::io::Result<()> {
    let backend = state.service.backend_name();
    let app = app(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_address, port)).await?;
    let actual_port = listener.local_addr()?.port();

    log::info!(
        target: "kanban.server",
        "HTTP server listening on http://{}:{} ({} storage)",
        bind_address,
        actual_port,
        backend
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!(target: "kanban.server", "HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!(target: "kanban.server", "Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!(target: "kanban.server", "Failed to listen for SIGTERM: {}", e);
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
    log::info!(target: "kanban.server", "Shutdown signal received, draining connections");
}
