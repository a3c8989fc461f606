//! Authentication middleware.
//!
//! Two disjoint chains: SDK traffic (`/analyze`) authenticates with an
//! opaque project API key; dashboard traffic authenticates with an
//! HS256-signed bearer JWT. Every failure mode is a plain `401` with a
//! short fixed message; details stay in the logs.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use crate::AppState;
use crate::context::{ProjectId, UserId};

/// `Authorization: Bearer <credential>` or nothing.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Some(token),
        _ => None,
    }
}

/// SDK chain: resolve the API key to a project.
pub async fn auth_sdk(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(api_key) = bearer_token(request.headers()) else {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized: Missing API Key"));
    };

    let project_id = match state.store.get_project_id_by_key(api_key).await {
        Ok(id) => id,
        Err(err) => {
            warn!(error = %err, "SDK auth failed");
            return Err((StatusCode::UNAUTHORIZED, "Unauthorized: Invalid API Key"));
        }
    };

    request.extensions_mut().insert(ProjectId(project_id));
    Ok(next.run(request).await)
}

/// Only `sub` is read; `exp` presence and expiry are enforced by the
/// validation itself.
#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Dashboard chain: verify the JWT and extract `sub`.
///
/// Validation is pinned to HS256; a token whose header names any other
/// algorithm fails before signature inspection, closing the
/// alg-confusion hole.
pub async fn auth_dashboard(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(token) = bearer_token(request.headers()) else {
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized: Missing Token"));
    };

    let key = DecodingKey::from_secret(state.jwt_secret.as_bytes());
    let validation = Validation::new(Algorithm::HS256);

    let data = match jsonwebtoken::decode::<Claims>(token, &key, &validation) {
        Ok(data) => data,
        Err(err) => {
            warn!(error = %err, "dashboard auth failed");
            return Err((StatusCode::UNAUTHORIZED, "Unauthorized: Invalid Token"));
        }
    };

    let Ok(user_id) = Uuid::parse_str(&data.claims.sub) else {
        warn!("dashboard token subject is not a UUID");
        return Err((StatusCode::UNAUTHORIZED, "Unauthorized: Invalid Token"));
    };

    request.extensions_mut().insert(UserId(user_id));
    Ok(next.run(request).await)
}
