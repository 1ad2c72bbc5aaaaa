//! Domain types for the KevCal calendar client.
//!
//! Job and mockup snapshots as the remote service reports them, upload
//! selection rules, and the shared error type.

pub mod error;
pub mod job;
pub mod mockup;
pub mod status;
pub mod types;
pub mod upload;
