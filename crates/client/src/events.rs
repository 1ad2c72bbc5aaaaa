//! Events emitted by a [`CalendarSession`](crate::session::CalendarSession).
//!
//! Front ends subscribe to these instead of the session touching any UI
//! directly. Every user-facing message goes out as a [`SessionEvent::Notice`].

use std::path::PathBuf;

use kevcal_core::job::GeneratedImage;
use serde::Serialize;

/// What the session is busy with. Action buttons are enabled only in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UiState {
    Idle,
    Uploading,
    Generating,
    CreatingProduct,
    RenderingMockup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    StateChanged {
        state: UiState,
    },

    ConnectionChecked {
        connected: bool,
        summary: String,
    },

    FileAdded {
        id: String,
        name: String,
    },

    FileRemoved {
        id: String,
        name: String,
    },

    JobStarted {
        job_id: String,
    },

    /// One tick of the job poll.
    Progress {
        job_id: String,
        /// Completion percentage (0-100).
        percent: u8,
        /// e.g. `"Swapping faces (40%)"`.
        label: String,
    },

    GenerationCompleted {
        job_id: String,
        images: Vec<GeneratedImage>,
    },

    /// Printful accepted the job; `task_key` is set when a mockup task started.
    ProductStarted {
        job_id: String,
        task_key: Option<String>,
    },

    /// One tick of the mockup poll.
    MockupChecked {
        task_key: String,
        attempt: u32,
    },

    MockupsReady {
        urls: Vec<String>,
    },

    ImageDownloaded {
        month: u32,
        path: PathBuf,
    },

    Notice {
        level: NoticeLevel,
        message: String,
    },
}
