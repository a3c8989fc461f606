//! Argus analysis backend.
//!
//! One axum application with two authenticated surfaces: the SDK analyze
//! endpoint (project API keys) and the dashboard project CRUD (end-user
//! JWTs). Built on Axum for high performance async HTTP.

pub mod config;
pub mod context;
pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use argus_analyzer::Analyzer;
use argus_storage::Store;
use axum::Router;
use axum::http::{Method, header};
use axum::middleware as axum_middleware;
use axum::routing::{delete, post};
use tokio::sync::Semaphore;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Concurrent detached persistence tasks permitted at once.
const PERSIST_POOL_SIZE: usize = 256;

/// Shared application state.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub analyzer: Analyzer,
    pub jwt_secret: String,
    pub persist_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, analyzer: Analyzer, jwt_secret: String) -> Self {
        Self {
            store,
            analyzer,
            jwt_secret,
            persist_permits: Arc::new(Semaphore::new(PERSIST_POOL_SIZE)),
        }
    }
}

/// Build the full application router.
///
/// Auth is attached at the method-router level so unknown paths stay on
/// the plain `404` fallback and a wrong method yields `405` without ever
/// consulting credentials; CORS sits outermost so preflights never reach
/// the auth chains.
pub fn build_router(state: Arc<AppState>) -> Router {
    let sdk_auth = axum_middleware::from_fn_with_state(state.clone(), middleware::auth_sdk);
    let dashboard_auth =
        axum_middleware::from_fn_with_state(state.clone(), middleware::auth_dashboard);

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::OPTIONS,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route(
            "/analyze",
            post(handlers::handle_analyze).route_layer(sdk_auth),
        )
        .route(
            "/projects",
            post(handlers::handle_create_project)
                .get(handlers::handle_list_projects)
                .patch(handlers::handle_rename_project)
                .delete(handlers::handle_delete_project)
                .route_layer(dashboard_auth.clone()),
        )
        .route(
            "/rotate-key",
            post(handlers::handle_rotate_key).route_layer(dashboard_auth.clone()),
        )
        .route(
            "/account",
            delete(handlers::handle_delete_account).route_layer(dashboard_auth),
        )
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
