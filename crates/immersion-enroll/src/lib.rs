//! Domain library for the work immersion enrollment service.
//!
//! The `workflows::enrollment` module carries the wizard state machine,
//! capacity gating, roster verification, and the admin console; `config`,
//! `telemetry`, and `error` provide the service plumbing shared with the
//! API binary.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
