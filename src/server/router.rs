use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::{download, repos, webhook};
use crate::config::ServerConfig;
use crate::github::CodeHost;
use crate::store::Store;
use crate::worker::JobQueue;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub host: Arc<dyn CodeHost>,
    pub config: ServerConfig,
    pub queue: JobQueue,
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/synchronizations",
            post(repos::create_synchronization),
        )
        .route("/api/tasks/{id}", get(repos::get_task))
        .route(
            "/api/{username}/repositories",
            get(repos::list_repositories),
        )
        .route(
            "/api/{username}/repositories/{name}/activate",
            post(repos::activate_repository),
        )
        .route(
            "/api/{username}/repositories/{name}/deactivate",
            post(repos::deactivate_repository),
        )
        .route(
            "/api/{username}/presentations",
            get(repos::list_presentations),
        )
        .route(
            "/webhook/{username}/{repository}",
            post(webhook::receive),
        )
        .route(
            "/{username}/{repository}/{presentation}",
            get(download::download_index),
        )
        .route(
            "/{username}/{repository}/{presentation}/{*path}",
            get(download::download),
        )
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
