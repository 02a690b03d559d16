//! Vehicle transit library
//!
//! Zone-to-zone transit counting for vehicles crossing a monitored junction,
//! and an MQTT telemetry publisher for the results. Exposes modules for
//! integration testing and binary reuse.

pub mod domain;
pub mod error;
pub mod infra;
pub mod io;
pub mod services;
