//! Pipeline - the long-running harvest loop and its shutdown wiring

pub mod orchestrator;
pub mod shutdown;

pub use orchestrator::{CycleReport, Orchestrator, OrchestratorError, RunSummary};
pub use shutdown::spawn_signal_listener;
