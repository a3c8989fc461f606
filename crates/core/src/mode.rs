//! Security modes for the sidecar mediator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// When and how the AI classifier is consulted.
///
/// Configured per route prefix at sidecar startup and immutable for the
/// lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecurityMode {
    /// Never wait for the AI; the signature verdict alone decides.
    LatencyFirst,
    /// AI is consulted synchronously only when the signature layer blocks,
    /// to rescue false positives.
    SmartShield,
    /// AI is consulted synchronously on every request.
    Paranoid,
}

impl SecurityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityMode::LatencyFirst => "LATENCY_FIRST",
            SecurityMode::SmartShield => "SMART_SHIELD",
            SecurityMode::Paranoid => "PARANOID",
        }
    }
}

impl fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LATENCY_FIRST" => Ok(SecurityMode::LatencyFirst),
            "SMART_SHIELD" => Ok(SecurityMode::SmartShield),
            "PARANOID" => Ok(SecurityMode::Paranoid),
            other => Err(format!("unknown security mode: {other}")),
        }
    }
}
