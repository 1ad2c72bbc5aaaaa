//! Fixed-interval status polling for long-running remote work.
//!
//! [`poll_status`] fetches a status snapshot once per tick until the
//! snapshot reports a terminal state, the optional attempt ceiling is
//! reached, a fetch fails, or the [`CancellationToken`] fires.
//!
//! The clock is injected through [`Ticker`] so tests can drive ticks
//! without waiting on the wall clock. A fetch error ends the poll at once;
//! there is no retry and no backoff.

use std::time::Duration;

use async_trait::async_trait;
use kevcal_core::job::{GeneratedImage, JobSnapshot, JobStatus};
use kevcal_core::mockup::{MockupSnapshot, MockupStatus};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, KevCalApi};

/// Interval between calendar job status checks.
pub const JOB_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Interval between mockup status checks.
pub const MOCKUP_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Mockup polling gives up after this many checks (~60 s at the default interval).
pub const MOCKUP_MAX_ATTEMPTS: u32 = 30;

const FAILED_WITHOUT_MESSAGE: &str = "Unknown error";

/// How often to poll and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    pub interval: Duration,
    /// `None` polls until a terminal state or cancellation.
    pub max_attempts: Option<u32>,
}

impl PollConfig {
    /// Calendar job: every second, no ceiling.
    pub fn job() -> Self {
        Self {
            interval: JOB_POLL_INTERVAL,
            max_attempts: None,
        }
    }

    /// Mockup task: every two seconds, at most 30 checks.
    pub fn mockup() -> Self {
        Self {
            interval: MOCKUP_POLL_INTERVAL,
            max_attempts: Some(MOCKUP_MAX_ATTEMPTS),
        }
    }

    /// A wall-clock ticker for this interval.
    pub fn ticker(&self) -> IntervalTicker {
        IntervalTicker::new(self.interval)
    }
}

/// Where a snapshot sits in the poll state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PollPhase<T> {
    /// Pending or processing; keep polling.
    Running,
    Completed(T),
    Failed(String),
}

/// A status snapshot the poller knows how to classify.
pub trait PollSnapshot {
    /// Payload produced on terminal success.
    type Output;

    fn phase(&self) -> PollPhase<Self::Output>;
}

/// The status-fetching operation being polled.
#[async_trait]
pub trait StatusSource: Send + Sync {
    type Snapshot: PollSnapshot + Send;

    async fn fetch_status(&self, id: &str) -> Result<Self::Snapshot, ApiError>;
}

/// A source of poll ticks.
#[async_trait]
pub trait Ticker: Send {
    /// Wait until the next tick is due.
    async fn tick(&mut self);
}

/// [`Ticker`] backed by [`tokio::time::Interval`].
///
/// The first tick fires one full period after creation, matching an
/// interval timer rather than firing immediately.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Why polling stopped without a result.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The remote work reached its failed state.
    #[error("{message}")]
    Failed { message: String },

    /// The attempt ceiling was reached before a terminal state.
    #[error("no terminal status after {attempts} attempts")]
    TimedOut { attempts: u32 },

    /// A status request failed; polling stopped at once.
    #[error("status check failed: {0}")]
    Fetch(#[from] ApiError),

    /// The caller cancelled the poll.
    #[error("polling cancelled")]
    Cancelled,
}

/// Poll `source` for `id` until a terminal state.
///
/// `on_tick` runs once per successful fetch, before the snapshot is
/// classified, with the 1-based attempt number. A ceiling of zero is
/// treated as one.
pub async fn poll_status<S, T, F>(
    id: &str,
    source: &S,
    ticker: &mut T,
    max_attempts: Option<u32>,
    cancel: &CancellationToken,
    mut on_tick: F,
) -> Result<<S::Snapshot as PollSnapshot>::Output, PollError>
where
    S: StatusSource + ?Sized,
    T: Ticker + ?Sized,
    F: FnMut(u32, &S::Snapshot),
{
    let max_attempts = max_attempts.map(|m| m.max(1));
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(id, attempt, "Polling cancelled");
                return Err(PollError::Cancelled);
            }
            _ = ticker.tick() => {}
        }

        attempt += 1;

        // An in-flight request is dropped on cancellation; its response is never read.
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!(id, attempt, "Polling cancelled during status check");
                return Err(PollError::Cancelled);
            }
            result = source.fetch_status(id) => result,
        };

        let snapshot = match fetched {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(id, attempt, error = %e, "Status check failed");
                return Err(PollError::Fetch(e));
            }
        };

        on_tick(attempt, &snapshot);

        match snapshot.phase() {
            PollPhase::Completed(output) => {
                tracing::debug!(id, attempt, "Polling reached completed state");
                return Ok(output);
            }
            PollPhase::Failed(message) => {
                tracing::debug!(id, attempt, message = %message, "Polling reached failed state");
                return Err(PollError::Failed { message });
            }
            PollPhase::Running => {}
        }

        if let Some(max) = max_attempts {
            if attempt >= max {
                tracing::warn!(id, attempts = attempt, "Polling ceiling reached");
                return Err(PollError::TimedOut { attempts: attempt });
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot classification
// ---------------------------------------------------------------------------

impl PollSnapshot for JobSnapshot {
    type Output = Vec<GeneratedImage>;

    fn phase(&self) -> PollPhase<Self::Output> {
        match self.status {
            JobStatus::Completed => PollPhase::Completed(self.images.clone().unwrap_or_default()),
            JobStatus::Failed => PollPhase::Failed(
                self.error
                    .clone()
                    .unwrap_or_else(|| FAILED_WITHOUT_MESSAGE.to_string()),
            ),
            JobStatus::Pending | JobStatus::Processing | JobStatus::Unknown => PollPhase::Running,
        }
    }
}

impl PollSnapshot for MockupSnapshot {
    /// Mockup URLs, possibly empty.
    type Output = Vec<String>;

    fn phase(&self) -> PollPhase<Self::Output> {
        match self.status() {
            MockupStatus::Completed => PollPhase::Completed(self.mockup_urls()),
            MockupStatus::Failed => {
                PollPhase::Failed("Printful mockup generation failed".to_string())
            }
            MockupStatus::Pending | MockupStatus::Unknown => PollPhase::Running,
        }
    }
}

// ---------------------------------------------------------------------------
// Status sources backed by the REST API
// ---------------------------------------------------------------------------

/// Polls `GET /api/job/{id}`.
pub struct JobStatusSource<'a>(pub &'a KevCalApi);

#[async_trait]
impl StatusSource for JobStatusSource<'_> {
    type Snapshot = JobSnapshot;

    async fn fetch_status(&self, id: &str) -> Result<JobSnapshot, ApiError> {
        self.0.job_status(id).await
    }
}

/// Polls `GET /api/printful/mockup-status/{task_key}`.
pub struct MockupStatusSource<'a>(pub &'a KevCalApi);

#[async_trait]
impl StatusSource for MockupStatusSource<'_> {
    type Snapshot = MockupSnapshot;

    async fn fetch_status(&self, id: &str) -> Result<MockupSnapshot, ApiError> {
        self.0.mockup_status(id).await
    }
}
