use crate::orchestrator::SyncOrchestrator;
use crate::types::{SyncStatus, SyncSummary, SyncTarget};
use axum::{
    http::{Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "esim-sync",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// The trigger surface always answers with the JSON summary; a partial
/// pass is success=false with the committed counts, not an opaque 500.
/// Only a pass that wrote nothing at all maps to an error status code.
fn summary_response(summary: SyncSummary) -> (StatusCode, Json<SyncSummary>) {
    let code = match summary.status {
        SyncStatus::Completed | SyncStatus::Partial => StatusCode::OK,
        SyncStatus::Failed => StatusCode::BAD_GATEWAY,
    };
    (code, Json(summary))
}

async fn sync_packages(
    Extension(orchestrator): Extension<Arc<SyncOrchestrator>>,
) -> impl IntoResponse {
    summary_response(orchestrator.run_sync(SyncTarget::Packages).await)
}

async fn sync_topups(
    Extension(orchestrator): Extension<Arc<SyncOrchestrator>>,
) -> impl IntoResponse {
    summary_response(orchestrator.run_sync(SyncTarget::Topups).await)
}

/// Create the HTTP server with all routes. Caller authentication sits in
/// front of this service and is not handled here.
pub fn create_server(orchestrator: Arc<SyncOrchestrator>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        // Admin/task endpoints, one POST per sync target
        .route("/admin/sync-packages", post(sync_packages))
        .route("/admin/sync-topups", post(sync_topups))
        .layer(Extension(orchestrator))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Start the HTTP server on the specified port
pub async fn start_server(
    orchestrator: Arc<SyncOrchestrator>,
    port: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = create_server(orchestrator);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    println!("🚀 HTTP server running on http://localhost:{port}");
    println!("💚 Health check: http://localhost:{port}/health");
    println!("📦 Sync trigger: POST http://localhost:{port}/admin/sync-packages");

    Server::bind(&addr).serve(app.into_make_service()).await?;

    Ok(())
}
