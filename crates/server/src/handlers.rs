//! HTTP handlers: the SDK analyze endpoint and the dashboard project CRUD.

use std::sync::Arc;
use std::time::Duration;

use argus_core::protocol::{
    CreateProjectRequest, ProjectIdRequest, ProjectResponse, RenameProjectRequest,
    RotateKeyResponse,
};
use argus_core::{AnalysisRequest, AnalysisResponse, Project, StoreError};
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use tracing::{error, warn};
use uuid::Uuid;

use crate::AppState;
use crate::context::{ProjectId, UserId};

/// Ceiling on one analyzer invocation.
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(60);

type HandlerError = (StatusCode, &'static str);

fn store_error(err: StoreError) -> HandlerError {
    match err {
        StoreError::NotFound => (StatusCode::INTERNAL_SERVER_ERROR, "not found"),
        other => {
            error!(error = %other, "storage operation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}

// ── SDK: POST /analyze ─────────────────────────────────────────────────

/// Classify one request and respond synchronously; persistence happens on
/// a detached task that never delays the response.
pub async fn handle_analyze(
    State(state): State<Arc<AppState>>,
    axum::Extension(ProjectId(project_id)): axum::Extension<ProjectId>,
    body: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, HandlerError> {
    let Ok(Json(request)) = body else {
        return Err((StatusCode::BAD_REQUEST, "JSON decoding error"));
    };

    let analysis = tokio::time::timeout(ANALYZE_TIMEOUT, state.analyzer.analyze(&request)).await;

    let response = match analysis {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            error!(error = %err, route = %request.route, "analysis failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "analysis error"));
        }
        Err(_) => {
            error!(route = %request.route, "analysis timed out");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, "analysis error"));
        }
    };

    spawn_save_threat(&state, project_id, request, response.clone());

    Ok(Json(response))
}

/// Persist the verdict at most once, off the request path.
///
/// The task owns a semaphore permit so persistence cannot pile up without
/// bound under load; when no permit is free the record is dropped (delivery
/// is at-most-once). The task runs on a fresh spawn, so a client
/// disconnect never cancels it.
fn spawn_save_threat(
    state: &Arc<AppState>,
    project_id: Uuid,
    request: AnalysisRequest,
    response: AnalysisResponse,
) {
    let Ok(permit) = state.persist_permits.clone().try_acquire_owned() else {
        warn!(project_id = %project_id, "persistence pool exhausted, dropping threat record");
        return;
    };

    let store = state.store.clone();
    tokio::spawn(async move {
        let _permit = permit;
        if let Err(err) = store.save_threat(project_id, &request, &response).await {
            error!(error = %err, project_id = %project_id, "failed to persist threat record");
        }
    });
}

// ── Dashboard: project CRUD ────────────────────────────────────────────

pub async fn handle_create_project(
    State(state): State<Arc<AppState>>,
    axum::Extension(UserId(user_id)): axum::Extension<UserId>,
    body: Result<Json<CreateProjectRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProjectResponse>), HandlerError> {
    let Ok(Json(request)) = body else {
        return Err((StatusCode::BAD_REQUEST, "JSON decoding error"));
    };

    let project = state
        .store
        .create_project(user_id, &request.name)
        .await
        .map_err(store_error)?;

    Ok((StatusCode::CREATED, Json(ProjectResponse { project })))
}

pub async fn handle_list_projects(
    State(state): State<Arc<AppState>>,
    axum::Extension(UserId(user_id)): axum::Extension<UserId>,
) -> Result<Json<Vec<Project>>, HandlerError> {
    let projects = state
        .store
        .list_projects(user_id)
        .await
        .map_err(store_error)?;

    Ok(Json(projects))
}

pub async fn handle_rename_project(
    State(state): State<Arc<AppState>>,
    axum::Extension(UserId(user_id)): axum::Extension<UserId>,
    body: Result<Json<RenameProjectRequest>, JsonRejection>,
) -> Result<Json<ProjectResponse>, HandlerError> {
    let Ok(Json(request)) = body else {
        return Err((StatusCode::BAD_REQUEST, "JSON decoding error"));
    };

    let project = state
        .store
        .rename_project(user_id, request.id, &request.name)
        .await
        .map_err(store_error)?;

    Ok(Json(ProjectResponse { project }))
}

pub async fn handle_delete_project(
    State(state): State<Arc<AppState>>,
    axum::Extension(UserId(user_id)): axum::Extension<UserId>,
    body: Result<Json<ProjectIdRequest>, JsonRejection>,
) -> Result<StatusCode, HandlerError> {
    let Ok(Json(request)) = body else {
        return Err((StatusCode::BAD_REQUEST, "JSON decoding error"));
    };

    state
        .store
        .delete_project(user_id, request.id)
        .await
        .map_err(store_error)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn handle_rotate_key(
    State(state): State<Arc<AppState>>,
    axum::Extension(UserId(user_id)): axum::Extension<UserId>,
    body: Result<Json<ProjectIdRequest>, JsonRejection>,
) -> Result<Json<RotateKeyResponse>, HandlerError> {
    let Ok(Json(request)) = body else {
        return Err((StatusCode::BAD_REQUEST, "JSON decoding error"));
    };

    let api_key = state
        .store
        .rotate_api_key(user_id, request.id)
        .await
        .map_err(store_error)?;

    Ok(Json(RotateKeyResponse { api_key }))
}

pub async fn handle_delete_account(
    State(state): State<Arc<AppState>>,
    axum::Extension(UserId(user_id)): axum::Extension<UserId>,
) -> Result<StatusCode, HandlerError> {
    state
        .store
        .delete_account(user_id)
        .await
        .map_err(store_error)?;

    Ok(StatusCode::NO_CONTENT)
}
