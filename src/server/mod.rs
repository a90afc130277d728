//! Task-network visualization endpoint.
//!
//! Serves the rendered task tree as JSON for a front-end. The graph snapshot
//! is taken once at startup; re-run the command to pick up server changes.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::analyzer::TreeNode;

#[derive(Clone)]
struct AppState {
    tree: Arc<Vec<TreeNode>>,
}

/// Build the router serving the task network
pub fn create_app(tree: Vec<TreeNode>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
        .allow_headers(Any);

    let state = AppState {
        tree: Arc::new(tree),
    };

    Router::new()
        .route("/health", get(health))
        .route("/tasknetwork", get(task_network))
        .layer(ServiceBuilder::new().layer(cors))
        .with_state(state)
}

/// Serve the task network until the process is stopped
pub async fn start_server(port: u16, tree: Vec<TreeNode>) -> anyhow::Result<()> {
    let app = create_app(tree);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("Task network available on http://localhost:{}/tasknetwork", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn task_network(State(state): State<AppState>) -> Json<Vec<TreeNode>> {
    Json(state.tree.as_ref().clone())
}
