//! The request mediation pipeline.
//!
//! Per request: capture the body once, evaluate the signature rules on a
//! snapshot, then apply the mode decision table. The captured bytes are
//! reused for rule evaluation, the analysis payload, and forwarding, so
//! the origin always sees exactly what the client sent.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use argus_core::{AnalysisRequest, SecurityMode};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{Request, Response, StatusCode};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::client::AnalysisSender;
use crate::proxy::{OriginProxy, plain_response};
use crate::rules::{RequestSnapshot, RuleEngine};

/// Bodies above this are rejected outright; replay holds the whole body
/// in memory.
const MAX_BODY_CAPTURE: usize = 10 * 1024 * 1024;

/// At most this many body bytes feed rule evaluation and the analysis
/// payload. The forwarded request always carries the original bytes.
const RULE_EVAL_CAP: usize = 1024 * 1024;

/// Concurrent fire-and-forget log tasks permitted at once.
const LOG_POOL_SIZE: usize = 256;

const BLOCKED_SHIELD: &str = "Blocked by Argus Shield";
const BLOCKED_SMART: &str = "Blocked by Argus Smart Shield";
const BLOCKED_PARANOID: &str = "Blocked by Argus Paranoid Shield";

#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Allow,
    Block(&'static str),
}

pub struct Mediator {
    mode: SecurityMode,
    waf: Arc<RuleEngine>,
    sender: Arc<dyn AnalysisSender>,
    proxy: Arc<OriginProxy>,
    log_permits: Arc<Semaphore>,
}

impl Mediator {
    pub fn new(
        mode: SecurityMode,
        waf: Arc<RuleEngine>,
        sender: Arc<dyn AnalysisSender>,
        proxy: Arc<OriginProxy>,
    ) -> Self {
        Self {
            mode,
            waf,
            sender,
            proxy,
            log_permits: Arc::new(Semaphore::new(LOG_POOL_SIZE)),
        }
    }

    /// Mediate one request whose mode prefix was already stripped.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let (parts, body) = request.into_parts();

        let body_bytes = match axum::body::to_bytes(body, MAX_BODY_CAPTURE).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "rejecting request: body capture failed");
                return plain_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
            }
        };

        let eval_slice = &body_bytes[..body_bytes.len().min(RULE_EVAL_CAP)];

        let snapshot = RequestSnapshot {
            method: &parts.method,
            uri: &parts.uri,
            headers: &parts.headers,
            body: eval_slice,
        };
        let waf_blocked = match self.waf.check(&snapshot) {
            Ok(blocked) => blocked,
            Err(err) => {
                warn!(error = %err, "rule engine failed, treating request as clean");
                false
            }
        };

        let payload = build_payload(&parts, eval_slice, waf_blocked);

        debug!(
            mode = %self.mode,
            route = %payload.route,
            waf_blocked,
            "mediating request"
        );

        match self.decide(waf_blocked, &payload).await {
            Verdict::Allow => self.proxy.forward(&parts, body_bytes).await,
            Verdict::Block(reason) => plain_response(StatusCode::FORBIDDEN, reason),
        }
    }

    /// The mode decision table.
    ///
    /// On a synchronous AI failure: SMART_SHIELD blocks (the signature
    /// layer already flagged the request), PARANOID allows (the AI is the
    /// only signal there).
    async fn decide(&self, waf_blocked: bool, payload: &AnalysisRequest) -> Verdict {
        match self.mode {
            SecurityMode::LatencyFirst => {
                self.spawn_log(payload.clone());
                if waf_blocked {
                    Verdict::Block(BLOCKED_SHIELD)
                } else {
                    Verdict::Allow
                }
            }
            SecurityMode::SmartShield => {
                if !waf_blocked {
                    self.spawn_log(payload.clone());
                    return Verdict::Allow;
                }
                match self.sender.send_analysis(payload).await {
                    Ok(verdict) if verdict.is_threat == Some(false) => Verdict::Allow,
                    Ok(_) => Verdict::Block(BLOCKED_SMART),
                    Err(err) => {
                        warn!(error = %err, "AI unavailable on flagged request, failing closed");
                        Verdict::Block(BLOCKED_SMART)
                    }
                }
            }
            SecurityMode::Paranoid => match self.sender.send_analysis(payload).await {
                Ok(verdict) if verdict.is_threat == Some(true) => Verdict::Block(BLOCKED_PARANOID),
                Ok(_) => Verdict::Allow,
                Err(err) => {
                    warn!(error = %err, "AI unavailable in paranoid mode, failing open");
                    Verdict::Allow
                }
            },
        }
    }

    /// Fire-and-forget delivery of the analysis payload. The task may
    /// outlive the response; its errors are recorded and dropped. The
    /// permit pool bounds task growth under load.
    fn spawn_log(&self, payload: AnalysisRequest) {
        let Ok(permit) = self.log_permits.clone().try_acquire_owned() else {
            warn!(route = %payload.route, "log pool exhausted, dropping analysis log");
            return;
        };

        let sender = self.sender.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(err) = sender.send_analysis(&payload).await {
                debug!(error = %err, "async analysis log failed");
            }
        });
    }
}

/// Assemble the wire payload for one request.
///
/// A header contributes its first value only; values are made UTF-8 by
/// lossy conversion. The synthetic `Method` key and the `waf_result`
/// annotation are always present.
fn build_payload(parts: &Parts, body: &[u8], waf_blocked: bool) -> AnalysisRequest {
    let mut headers = HashMap::new();
    for name in parts.headers.keys() {
        if let Some(value) = parts.headers.get(name) {
            headers.insert(
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
    }
    headers.insert("Method".to_string(), parts.method.to_string());

    let mut metadata = HashMap::new();
    metadata.insert(
        "waf_result".to_string(),
        if waf_blocked { "BLOCK" } else { "PASS" }.to_string(),
    );

    let ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    AnalysisRequest {
        log: String::from_utf8_lossy(body).into_owned(),
        ip,
        headers,
        route: parts.uri.path().to_string(),
        metadata,
    }
}
