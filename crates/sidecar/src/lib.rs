//! In-path Argus sidecar.
//!
//! Three entry prefixes map to the three security modes; the prefix is
//! stripped before mediation, and anything else gets an informational
//! banner. One rule engine, one circuit-broken analysis client, and one
//! origin proxy are shared by all modes.

pub mod breaker;
pub mod client;
pub mod config;
pub mod mediator;
pub mod proxy;
pub mod rules;

use std::sync::Arc;

use argus_core::SecurityMode;
use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, Response, StatusCode, Uri};

use crate::client::AnalysisSender;
use crate::mediator::Mediator;
use crate::proxy::{OriginProxy, plain_response};
use crate::rules::RuleEngine;

const BANNER: &str = "Argus Multi-Mode Sidecar Active.\n\
    Use /latency-first/, /smart-shield/, or /paranoid/ as your entry point.";

pub struct SidecarState {
    /// Entry prefix → mediator, matched by longest prefix.
    mediators: Vec<(&'static str, Mediator)>,
}

impl SidecarState {
    pub fn new(
        waf: Arc<RuleEngine>,
        sender: Arc<dyn AnalysisSender>,
        proxy: Arc<OriginProxy>,
    ) -> Self {
        let mediator = |mode| {
            Mediator::new(mode, waf.clone(), sender.clone(), proxy.clone())
        };
        Self {
            mediators: vec![
                ("/latency-first", mediator(SecurityMode::LatencyFirst)),
                ("/smart-shield", mediator(SecurityMode::SmartShield)),
                ("/paranoid", mediator(SecurityMode::Paranoid)),
            ],
        }
    }
}

pub fn build_router(state: Arc<SidecarState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Longest-prefix dispatch to a mediator; unmatched paths get the banner.
async fn dispatch(
    State(state): State<Arc<SidecarState>>,
    request: Request<Body>,
) -> Response<Body> {
    let path = request.uri().path();

    let matched = state
        .mediators
        .iter()
        .filter(|(prefix, _)| matches_prefix(path, prefix))
        .max_by_key(|(prefix, _)| prefix.len());

    match matched {
        Some((prefix, mediator)) => mediator.handle(strip_prefix(request, prefix)).await,
        None => plain_response(StatusCode::OK, BANNER),
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

/// Remove the mode prefix from the request URI, preserving the query.
fn strip_prefix(request: Request<Body>, prefix: &str) -> Request<Body> {
    let (mut parts, body) = request.into_parts();

    let path = parts.uri.path().strip_prefix(prefix).unwrap_or("");
    let path = if path.is_empty() { "/" } else { path };
    let path_and_query = match parts.uri.query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };
    parts.uri = path_and_query
        .parse::<Uri>()
        .unwrap_or_else(|_| Uri::from_static("/"));

    Request::from_parts(parts, body)
}
