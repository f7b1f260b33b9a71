//! Field control kernel: maps competition quadrants to team numbers and
//! aggregates robot-reported telemetry from the MQTT event bus into a
//! Prometheus registry.
//!
//! The two subsystems are independent: the stats listener and the
//! assignment table share nothing but the notion of a team number.

pub mod backoff;
pub mod config;
pub mod gamepad;
pub mod http;
pub mod mapping;
pub mod metrics;
pub mod state;
pub mod stats;
pub mod telemetry;
