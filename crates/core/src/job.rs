//! Calendar-generation job snapshots as reported by `GET /api/job/{id}`.
//!
//! The client never mutates a job; it only reads the snapshots the
//! service returns on each poll.

use serde::{Deserialize, Serialize};

/// Label shown when the service does not report a current step.
pub const DEFAULT_STEP_LABEL: &str = "Processing";

/// Lifecycle status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    /// Any status string this client does not know. Treated as still running.
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    /// Whether no further polling should happen after this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

/// One generated calendar page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
    /// Month index, 1-based.
    pub month: u32,
    #[serde(default)]
    pub theme: String,
}

/// A point-in-time view of a remote job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// Raw progress as sent by the service. Use [`JobSnapshot::percent`].
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub current_step: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<GeneratedImage>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobSnapshot {
    /// Progress as an integer percentage clamped to `0..=100`.
    pub fn percent(&self) -> u8 {
        if !self.progress.is_finite() {
            return 0;
        }
        self.progress.round().clamp(0.0, 100.0) as u8
    }

    /// The progress line shown while the job runs, e.g. `"Swapping faces (40%)"`.
    pub fn progress_label(&self) -> String {
        let step = self
            .current_step
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_STEP_LABEL);
        format!("{step} ({}%)", self.percent())
    }
}

/// File name used when saving the generated image at `index` (0-based).
pub fn download_file_name(index: usize) -> String {
    format!("calendar_month_{}.jpg", index + 1)
}
