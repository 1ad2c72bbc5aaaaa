//! KevCal calendar service client.
//!
//! Provides the HTTP API wrapper, the cancellable status poller used for
//! both the calendar job and the Printful mockup task, and the session
//! controller that chains upload, generation and product creation while
//! broadcasting progress events.

pub mod api;
pub mod events;
pub mod poller;
pub mod session;

pub use api::{ApiError, KevCalApi};
pub use events::{NoticeLevel, SessionEvent, UiState};
pub use poller::{poll_status, PollConfig, PollError};
pub use session::{CalendarSession, ProductOutcome, SessionConfig, SessionError};
