//! Configuration and cleanup scheduling

pub mod config;
pub mod orchestrator;

pub use config::{AutoAction, CleanerConfig};
pub use orchestrator::{CleanupOrchestrator, CleanupState, CycleOutcome, Decision, StopSignal};
