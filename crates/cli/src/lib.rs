//! Command-line front end for the KevCal calendar service.

pub mod config;
