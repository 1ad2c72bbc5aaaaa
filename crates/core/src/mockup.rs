//! Printful mockup task snapshots (`GET /api/printful/mockup-status/{task_key}`).
//!
//! The service wraps the Printful task result twice:
//! `{"mockup_data": {"result": {"status": ..., "mockups": [...]}}}`.
//! Any missing level is read as "still pending".

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockupStatus {
    Pending,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl MockupStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// A single rendered mockup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mockup {
    pub mockup_url: String,
    #[serde(default)]
    pub placement: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockupResult {
    pub status: MockupStatus,
    #[serde(default)]
    pub mockups: Option<Vec<Mockup>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockupData {
    #[serde(default)]
    pub result: Option<MockupResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MockupSnapshot {
    #[serde(default)]
    pub mockup_data: Option<MockupData>,
}

impl MockupSnapshot {
    pub fn result(&self) -> Option<&MockupResult> {
        self.mockup_data.as_ref()?.result.as_ref()
    }

    pub fn status(&self) -> MockupStatus {
        self.result()
            .map(|r| r.status)
            .unwrap_or(MockupStatus::Pending)
    }

    /// URLs of every rendered mockup, empty while pending.
    pub fn mockup_urls(&self) -> Vec<String> {
        self.result()
            .and_then(|r| r.mockups.as_ref())
            .map(|m| m.iter().map(|m| m.mockup_url.clone()).collect())
            .unwrap_or_default()
    }
}
