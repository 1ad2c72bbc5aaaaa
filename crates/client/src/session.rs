//! Calendar session controller.
//!
//! [`CalendarSession`] owns everything one user session needs (accepted
//! uploads, the current job, generated images, mockups, busy state) and
//! runs the sequential chain
//! `upload -> generate -> poll job -> create product -> poll mockup`.
//!
//! Progress and user-facing messages are broadcast as
//! [`SessionEvent`]s. Every operation returns the session to
//! [`UiState::Idle`] before it returns, whether it succeeded or not.

use std::path::{Path, PathBuf};

use kevcal_core::error::CoreError;
use kevcal_core::job::{download_file_name, GeneratedImage};
use kevcal_core::status::{ConnectionStatus, ProjectStatus};
use kevcal_core::types::JobId;
use kevcal_core::upload::{
    CandidateFile, UploadError, UploadManager, UploadedFile, DEFAULT_MAX_UPLOAD_BYTES,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, KevCalApi};
use crate::events::{NoticeLevel, SessionEvent, UiState};
use crate::poller::{poll_status, JobStatusSource, MockupStatusSource, PollConfig, PollError};

/// Broadcast channel capacity for session events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub job_poll: PollConfig,
    pub mockup_poll: PollConfig,
    pub max_upload_bytes: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            job_poll: PollConfig::job(),
            mockup_poll: PollConfig::mockup(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Which poll an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStage {
    Job,
    Mockup,
}

impl PollStage {
    fn check_failed_text(&self) -> &'static str {
        match self {
            Self::Job => "Failed to check generation status",
            Self::Mockup => "Failed to check mockup status",
        }
    }

    fn timed_out_text(&self) -> &'static str {
        match self {
            Self::Job => "Calendar generation is taking longer than expected",
            Self::Mockup => {
                "Mockup generation is taking longer than expected. Check your Printful dashboard."
            }
        }
    }
}

/// Errors surfaced by session operations. `Display` is the user-facing text.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Upload(#[from] UploadError),

    #[error("{0}")]
    Core(#[from] CoreError),

    #[error("Upload at least one image first")]
    NoUploads,

    #[error("Generate a calendar first")]
    NoJob,

    /// The start-job request failed.
    #[error("Failed to generate calendar")]
    Generation(#[source] ApiError),

    /// A status check failed mid-poll.
    #[error("{}", .stage.check_failed_text())]
    PollingFailure {
        stage: PollStage,
        #[source]
        source: ApiError,
    },

    /// The poll ceiling was reached without a terminal state.
    #[error("{}", .stage.timed_out_text())]
    PollingTimeout { stage: PollStage, attempts: u32 },

    /// The calendar job reported `failed`.
    #[error("Generation failed: {message}")]
    JobFailed { message: String },

    /// The mockup task reported `failed`.
    #[error("Printful mockup generation failed. Please try again.")]
    MockupFailed { message: String },

    #[error("Failed to create Printful product: {detail}")]
    ProductCreation { detail: String },

    #[error("Failed to download {file}: {source}")]
    Download {
        file: String,
        #[source]
        source: ApiError,
    },

    #[error("{0}")]
    Api(#[from] ApiError),

    #[error("Cancelled")]
    Cancelled,
}

impl SessionError {
    fn from_poll(stage: PollStage, err: PollError) -> Self {
        match err {
            PollError::Failed { message } => match stage {
                PollStage::Job => Self::JobFailed { message },
                PollStage::Mockup => Self::MockupFailed { message },
            },
            PollError::TimedOut { attempts } => Self::PollingTimeout { stage, attempts },
            PollError::Fetch(source) => Self::PollingFailure { stage, source },
            PollError::Cancelled => Self::Cancelled,
        }
    }
}

/// Result of [`CalendarSession::add_files`].
#[derive(Debug, Default)]
pub struct UploadReport {
    pub added: Vec<UploadedFile>,
    /// Files refused locally or by the service.
    pub failed: Vec<UploadError>,
}

/// Result of [`CalendarSession::create_product`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductOutcome {
    /// The service accepted the job but started no mockup task.
    Started,
    /// The mockup task completed. Empty when Printful rendered no previews.
    MockupsReady(Vec<String>),
}

/// State and workflow for one calendar-making session.
pub struct CalendarSession {
    api: KevCalApi,
    config: SessionConfig,
    uploads: UploadManager,
    job_id: Option<JobId>,
    images: Vec<GeneratedImage>,
    mockups: Vec<String>,
    state: UiState,
    event_tx: broadcast::Sender<SessionEvent>,
    /// Cancelled when the session is abandoned; every poll watches a child of it.
    cancel: CancellationToken,
}

impl CalendarSession {
    pub fn new(api: KevCalApi, config: SessionConfig) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            uploads: UploadManager::new(config.max_upload_bytes),
            config,
            job_id: None,
            images: Vec::new(),
            mockups: Vec::new(),
            state: UiState::Idle,
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// A handle that abandons the session from another task. Any running
    /// poll stops before its next status check, and later polls end at once.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> UiState {
        self.state
    }

    pub fn uploads(&self) -> &[UploadedFile] {
        self.uploads.files()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn images(&self) -> &[GeneratedImage] {
        &self.images
    }

    pub fn mockups(&self) -> &[String] {
        &self.mockups
    }

    pub fn can_generate(&self) -> bool {
        self.state == UiState::Idle && !self.uploads.is_empty()
    }

    pub fn can_create_product(&self) -> bool {
        self.state == UiState::Idle && self.job_id.is_some()
    }

    /// Check Printful connectivity. Never fails; an unreachable service is
    /// reported as disconnected.
    pub async fn verify_connection(&self) -> ConnectionStatus {
        let (status, summary) = match self.api.verify_connection().await {
            Ok(status) => {
                let summary = status.summary();
                (status, summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Printful connection check failed");
                let summary = "Failed to check Printful connection".to_string();
                (ConnectionStatus::unreachable(summary.clone()), summary)
            }
        };

        tracing::info!(connected = status.connected, "Printful connection checked");
        self.emit(SessionEvent::ConnectionChecked {
            connected: status.connected,
            summary,
        });
        status
    }

    pub async fn project_status(&self) -> Result<ProjectStatus, SessionError> {
        self.api.project_status().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to check project status");
            SessionError::Api(e)
        })
    }

    /// Select and upload a batch of local files.
    ///
    /// Fails only when no slot is free. Per-file problems (too large,
    /// upload refused) are listed in the report and announced as notices.
    pub async fn add_files(
        &mut self,
        batch: Vec<CandidateFile>,
    ) -> Result<UploadReport, SessionError> {
        let selection = match self.uploads.select(batch) {
            Ok(selection) => selection,
            Err(e) => {
                tracing::warn!(error = %e, "Upload batch rejected");
                self.notice(NoticeLevel::Warning, e.to_string());
                return Err(e.into());
            }
        };

        if selection.over_limit > 0 {
            tracing::warn!(ignored = selection.over_limit, "Upload batch exceeds free slots");
            self.notice(
                NoticeLevel::Warning,
                format!(
                    "Maximum {} files allowed; {} file(s) ignored",
                    self.uploads.max_files(),
                    selection.over_limit
                ),
            );
        }
        if selection.skipped_non_image > 0 {
            tracing::debug!(skipped = selection.skipped_non_image, "Skipped non-image files");
        }

        let mut report = UploadReport {
            added: Vec::new(),
            failed: selection.rejected,
        };
        for rejected in &report.failed {
            self.notice(NoticeLevel::Warning, rejected.to_string());
        }

        if selection.accepted.is_empty() {
            return Ok(report);
        }

        self.set_state(UiState::Uploading);
        for candidate in selection.accepted {
            match self.api.upload_file(&candidate).await {
                Ok(response) => {
                    let file = UploadedFile {
                        id: response.file_id,
                        name: response.filename,
                        preview: candidate.path,
                    };
                    if let Err(e) = self.uploads.register(file.clone()) {
                        report.failed.push(e);
                        continue;
                    }
                    tracing::info!(file_id = %file.id, name = %file.name, "File uploaded");
                    self.emit(SessionEvent::FileAdded {
                        id: file.id.clone(),
                        name: file.name.clone(),
                    });
                    report.added.push(file);
                }
                Err(e) => {
                    tracing::error!(file = %candidate.name, error = %e, "Upload failed");
                    self.notice(NoticeLevel::Error, "Failed to upload file");
                    report.failed.push(UploadError::Failed {
                        name: candidate.name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        self.set_state(UiState::Idle);

        Ok(report)
    }

    pub fn remove_file(&mut self, index: usize) -> Result<UploadedFile, SessionError> {
        let removed = self.uploads.remove(index)?;
        self.emit(SessionEvent::FileRemoved {
            id: removed.id.clone(),
            name: removed.name.clone(),
        });
        Ok(removed)
    }

    /// Start a calendar job from the first uploaded file and poll it to
    /// completion.
    ///
    /// The previous job and its images are discarded when the run starts.
    /// The new job becomes the session's job only once it completes.
    pub async fn generate(&mut self) -> Result<Vec<GeneratedImage>, SessionError> {
        let source_file_id = match self.uploads.source_file() {
            Some(file) => file.id.clone(),
            None => return Err(SessionError::NoUploads),
        };
        if self.cancel.is_cancelled() {
            tracing::info!("Session cancelled, calendar job not started");
            return Err(SessionError::Cancelled);
        }

        self.set_state(UiState::Generating);
        self.notice(NoticeLevel::Info, "Starting calendar generation...");
        let result = self.run_generation(&source_file_id).await;
        self.set_state(UiState::Idle);

        match &result {
            Ok(_) => self.notice(NoticeLevel::Success, "Calendar generated successfully!"),
            Err(e) => self.report_error("Calendar generation failed", e),
        }
        result
    }

    /// Send the current job to Printful and, when a mockup task starts,
    /// poll it until the mockups are ready.
    pub async fn create_product(&mut self) -> Result<ProductOutcome, SessionError> {
        let job_id = self.job_id.clone().ok_or(SessionError::NoJob)?;
        if self.cancel.is_cancelled() {
            tracing::info!(job_id = %job_id, "Session cancelled, Printful product not requested");
            return Err(SessionError::Cancelled);
        }

        self.set_state(UiState::CreatingProduct);
        let result = self.run_product(&job_id).await;
        self.set_state(UiState::Idle);

        match &result {
            Ok(ProductOutcome::Started) => {
                self.notice(NoticeLevel::Info, "Printful calendar upload started!")
            }
            Ok(ProductOutcome::MockupsReady(urls)) if urls.is_empty() => self.notice(
                NoticeLevel::Success,
                "Printful calendar created! Check your Printful dashboard.",
            ),
            Ok(ProductOutcome::MockupsReady(_)) => {
                self.notice(NoticeLevel::Success, "Printful calendar mockup ready!")
            }
            Err(e) => self.report_error("Printful product creation failed", e),
        }
        result
    }

    /// Save every generated image into `dir` as `calendar_month_{n}.jpg`.
    pub async fn download_all(&self, dir: &Path) -> Result<Vec<PathBuf>, SessionError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| SessionError::Api(ApiError::Io(e)))?;

        let mut saved = Vec::with_capacity(self.images.len());
        for (index, image) in self.images.iter().enumerate() {
            let file = download_file_name(index);
            let path = dir.join(&file);

            let bytes = match self.api.download(&image.url).await {
                Ok(bytes) => bytes,
                Err(source) => {
                    let err = SessionError::Download { file, source };
                    self.report_error("Image download failed", &err);
                    return Err(err);
                }
            };
            if let Err(e) = tokio::fs::write(&path, &bytes).await {
                let err = SessionError::Download {
                    file,
                    source: ApiError::Io(e),
                };
                self.report_error("Image download failed", &err);
                return Err(err);
            }

            tracing::debug!(month = image.month, path = %path.display(), "Image saved");
            self.emit(SessionEvent::ImageDownloaded {
                month: image.month,
                path: path.clone(),
            });
            saved.push(path);
        }

        tracing::info!(count = saved.len(), dir = %dir.display(), "Calendar images downloaded");
        Ok(saved)
    }

    // ---- private helpers ----

    async fn run_generation(
        &mut self,
        source_file_id: &str,
    ) -> Result<Vec<GeneratedImage>, SessionError> {
        self.job_id = None;
        self.images.clear();
        self.mockups.clear();

        let job_id = self
            .api
            .start_generation(source_file_id)
            .await
            .map_err(SessionError::Generation)?
            .job_id;

        tracing::info!(job_id = %job_id, source_file_id, "Calendar generation started");
        self.emit(SessionEvent::JobStarted {
            job_id: job_id.clone(),
        });

        let cancel = self.cancel.child_token();
        let poll = self.config.job_poll;
        let mut ticker = poll.ticker();
        let event_tx = self.event_tx.clone();
        let source = JobStatusSource(&self.api);

        let images = poll_status(
            &job_id,
            &source,
            &mut ticker,
            poll.max_attempts,
            &cancel,
            |attempt, job| {
                tracing::debug!(
                    job_id = %job_id,
                    attempt,
                    status = job.status.as_str(),
                    percent = job.percent(),
                    "Job status",
                );
                let _ = event_tx.send(SessionEvent::Progress {
                    job_id: job_id.clone(),
                    percent: job.percent(),
                    label: job.progress_label(),
                });
            },
        )
        .await
        .map_err(|e| SessionError::from_poll(PollStage::Job, e))?;

        tracing::info!(job_id = %job_id, count = images.len(), "Calendar generation completed");
        self.job_id = Some(job_id.clone());
        self.images = images.clone();
        self.emit(SessionEvent::GenerationCompleted {
            job_id,
            images: images.clone(),
        });
        Ok(images)
    }

    async fn run_product(&mut self, job_id: &str) -> Result<ProductOutcome, SessionError> {
        let response = self.api.create_product(job_id).await.map_err(|e| {
            let detail = match e {
                ApiError::Rejected { detail, .. } => detail,
                ApiError::Status { .. } => "Failed to create product".to_string(),
                other => other.to_string(),
            };
            SessionError::ProductCreation { detail }
        })?;

        tracing::info!(job_id, task_key = ?response.task_key, "Printful product requested");
        self.emit(SessionEvent::ProductStarted {
            job_id: job_id.to_string(),
            task_key: response.task_key.clone(),
        });

        let Some(task_key) = response.task_key else {
            return Ok(ProductOutcome::Started);
        };

        self.set_state(UiState::RenderingMockup);

        let cancel = self.cancel.child_token();
        let poll = self.config.mockup_poll;
        let mut ticker = poll.ticker();
        let event_tx = self.event_tx.clone();
        let source = MockupStatusSource(&self.api);

        let urls = poll_status(
            &task_key,
            &source,
            &mut ticker,
            poll.max_attempts,
            &cancel,
            |attempt, _| {
                tracing::debug!(task_key = %task_key, attempt, "Mockup status");
                let _ = event_tx.send(SessionEvent::MockupChecked {
                    task_key: task_key.clone(),
                    attempt,
                });
            },
        )
        .await
        .map_err(|e| SessionError::from_poll(PollStage::Mockup, e))?;

        tracing::info!(task_key = %task_key, count = urls.len(), "Printful mockups ready");
        self.mockups = urls.clone();
        self.emit(SessionEvent::MockupsReady { urls: urls.clone() });
        Ok(ProductOutcome::MockupsReady(urls))
    }

    fn set_state(&mut self, state: UiState) {
        if self.state != state {
            self.state = state;
            self.emit(SessionEvent::StateChanged { state });
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.event_tx.send(event);
    }

    fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.emit(SessionEvent::Notice {
            level,
            message: message.into(),
        });
    }

    fn report_error(&self, context: &str, err: &SessionError) {
        match err {
            SessionError::Cancelled => tracing::info!("{context}: cancelled"),
            SessionError::PollingTimeout { attempts, .. } => {
                tracing::warn!(attempts, "{context}: timed out")
            }
            _ => tracing::error!(error = %err, "{context}"),
        }
        let level = match err {
            SessionError::PollingTimeout { .. } | SessionError::Cancelled => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        self.notice(level, err.to_string());
    }
}
