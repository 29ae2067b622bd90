//! Opsight agent service
//!
//! Exposes the telemetry pipeline and the agents over HTTP.

pub mod api;
pub mod config;
