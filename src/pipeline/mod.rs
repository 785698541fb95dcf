//! Pipeline components: collaborator traits, step runner, bootstrap pacing and the orchestrator.

pub mod context;
pub mod error_handler;
pub mod orchestrator;
pub mod runner;
pub mod services;
pub mod walk;

pub use context::OrchestratorStatus;
pub use orchestrator::Orchestrator;
pub use runner::{PipelineNaming, PipelineRunner};
pub use services::{
    Analyzer, Announcer, Publisher, Reporter, Services, SummarySink, WorkspacePreparer,
};
pub use walk::{Debouncer, scan_existing, spawn_bootstrap_scan};
