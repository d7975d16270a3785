use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::config::CachePolicy;
use crate::error::Error;
use crate::lifecycle;
use crate::server::AppState;
use crate::server::dto::{
    CreateSynchronizationRequest, PresentationView, TaskRef, TransitionResponse,
};
use crate::server::response::{ApiError, ApiResponse, StoreOptionExt, StoreResultExt};
use crate::types::Repository;
use crate::worker::Job;

fn transition_error(e: Error) -> ApiError {
    match e {
        Error::InvalidTransition { .. } => ApiError::conflict(e.to_string()),
        Error::CredentialMissing { .. } => ApiError::bad_request(e.to_string()),
        Error::UpstreamNotFound(_) => ApiError::not_found(e.to_string()),
        _ => ApiError::internal(e.to_string()),
    }
}

fn lookup_repository(
    state: &AppState,
    username: &str,
    name: &str,
) -> Result<Repository, ApiError> {
    state
        .store
        .get_repository_by_route(username, name)
        .api_err("Failed to look up repository")?
        .or_not_found("Repository not found")
}

pub async fn list_repositories(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .store
        .get_account_by_username(&username)
        .api_err("Failed to look up account")?
        .or_not_found("Account not found")?;

    let repos = state
        .store
        .list_repositories(&state.config.site, &account.id)
        .api_err("Failed to list repositories")?;

    Ok(Json(ApiResponse::success(repos)))
}

pub async fn activate_repository(
    State(state): State<Arc<AppState>>,
    Path((username, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut repo = lookup_repository(&state, &username, &name)?;

    // The transition talks to the provider with a blocking client.
    let worker_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        lifecycle::activate(
            worker_state.store.as_ref(),
            worker_state.host.as_ref(),
            &worker_state.config,
            &mut repo,
        )
        .map(|()| repo)
    })
    .await
    .map_err(|_| ApiError::internal("Transition worker panicked"))?;

    let repo = result.map_err(transition_error)?;
    Ok(Json(ApiResponse::success(TransitionResponse {
        repository: repo,
        hook_removal: None,
    })))
}

pub async fn deactivate_repository(
    State(state): State<Arc<AppState>>,
    Path((username, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let mut repo = lookup_repository(&state, &username, &name)?;

    let worker_state = state.clone();
    let result = tokio::task::spawn_blocking(move || {
        lifecycle::deactivate(
            worker_state.store.as_ref(),
            worker_state.host.as_ref(),
            &mut repo,
        )
        .map(|removal| (repo, removal))
    })
    .await
    .map_err(|_| ApiError::internal("Transition worker panicked"))?;

    let (repo, removal) = result.map_err(transition_error)?;
    Ok(Json(ApiResponse::success(TransitionResponse {
        repository: repo,
        hook_removal: Some(removal),
    })))
}

pub async fn list_presentations(
    State(state): State<Arc<AppState>>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let account = state
        .store
        .get_account_by_username(&username)
        .api_err("Failed to look up account")?
        .or_not_found("Account not found")?;

    let repos = state
        .store
        .list_repositories(&state.config.site, &account.id)
        .api_err("Failed to list repositories")?;
    let presentations = state
        .store
        .list_account_presentations(&account.id)
        .api_err("Failed to list presentations")?;

    let external = state.config.external_url();
    let views: Vec<PresentationView> = presentations
        .into_iter()
        .filter_map(|p| {
            let repo = repos.iter().find(|r| r.id == p.repository_id)?;
            Some(PresentationView::new(p, &username, &repo.name, &external))
        })
        .collect();

    Ok(Json(ApiResponse::success(views)))
}

pub async fn create_synchronization(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSynchronizationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state
        .store
        .get_account_by_username(&req.username)
        .api_err("Failed to look up account")?
        .or_not_found("Account not found")?;

    let id = state.queue.enqueue(Job::Synchronize {
        username: req.username,
    });

    Ok((
        [(header::CACHE_CONTROL, CachePolicy::Disabled.header_value())],
        Json(ApiResponse::success(TaskRef {
            id,
            state: "pending",
        })),
    ))
}

pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let status = state
        .queue
        .registry()
        .get(id)
        .or_not_found("Unknown task")?;

    let mut body = serde_json::to_value(&status)
        .map_err(|_| ApiError::internal("Failed to serialize task status"))?;
    body["id"] = serde_json::Value::String(id.to_string());

    Ok((
        [(header::CACHE_CONTROL, CachePolicy::Disabled.header_value())],
        Json(body),
    ))
}
