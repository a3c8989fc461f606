//! Wire protocol between the sidecar SDK, the analysis backend, and the
//! dashboard.
//!
//! `AnalysisRequest` / `AnalysisResponse` are the analyze round trip;
//! the remaining types are the dashboard CRUD shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A mediated client request as seen by the sidecar, sent to `/analyze`.
///
/// `headers` holds the first value of every header plus the synthetic
/// `Method` key. `metadata` always carries `waf_result` (`PASS` or `BLOCK`);
/// any other keys are free-form annotations supplied by the SDK caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    /// Request body as UTF-8 text; may be truncated by the analyzer.
    pub log: String,

    /// Remote address of the original client.
    pub ip: String,

    /// First value per header name, plus the synthetic `Method` entry.
    pub headers: HashMap<String, String>,

    /// URL path after the mode prefix was stripped.
    pub route: String,

    /// Free-form annotations; always includes `waf_result`.
    pub metadata: HashMap<String, String>,
}

/// The backend's verdict for one request.
///
/// All three fields are nullable on the wire so "the model omitted the
/// field" is distinguishable from `false` / `""` / `0.0`. The analyzer
/// rejects responses with any field absent; downstream code may rely on
/// `Some` after a successful analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResponse {
    #[serde(default)]
    pub is_threat: Option<bool>,

    #[serde(default)]
    pub reason: Option<String>,

    /// Model certainty in [0,1]. Out-of-range values are passed through
    /// verbatim rather than clamped.
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl AnalysisResponse {
    /// True when all three verdict fields are present.
    pub fn is_complete(&self) -> bool {
        self.is_threat.is_some() && self.reason.is_some() && self.confidence.is_some()
    }
}

/// A tenant. Owns one API key and its threat log records.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
}

// --- Dashboard request/response shapes ---

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub project: Project,
}

#[derive(Debug, Deserialize)]
pub struct RenameProjectRequest {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectIdRequest {
    pub id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RotateKeyResponse {
    pub api_key: String,
}
