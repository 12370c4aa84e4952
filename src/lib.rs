//! Judge-gated multi-agent research orchestration core.
//!
//! Runs a bounded search → judge → iterate/synthesize loop over biomedical
//! literature providers, emitting a strictly-ordered progress `Event`
//! stream and producing a cited `Report`. See [`orchestrator::Orchestrator`]
//! for the entry point.

pub mod chat;
pub mod config;
pub mod embedding;
pub mod error;
pub mod judge;
pub mod model;
pub mod orchestrator;
pub mod search;
pub mod store;
pub mod synthesis;

pub use config::OrchestratorConfig;
pub use error::CoreError;
pub use orchestrator::Orchestrator;
