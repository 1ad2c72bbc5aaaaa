//! Service-level status payloads: Printful connectivity and the active
//! project summary.

use serde::{Deserialize, Serialize};

use crate::types::deserialize_id;

/// Result of `GET /api/printful/verify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl ConnectionStatus {
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            connected: false,
            message: Some(message.into()),
        }
    }

    /// The one-line status text shown next to the connection indicator.
    pub fn summary(&self) -> String {
        if self.connected {
            "Printful connected successfully".to_string()
        } else {
            match self.message.as_deref() {
                Some(msg) => format!("Printful error: {msg}"),
                None => "Printful error: unknown".to_string(),
            }
        }
    }
}

/// Result of `GET /api/project/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectStatus {
    #[serde(deserialize_with = "deserialize_id")]
    pub project_id: String,
    pub status: String,
    /// Per-month generation state, passed through untouched.
    #[serde(default)]
    pub months: serde_json::Value,
}
