//! Datawatch: watches a data directory and drives each qualifying file change through
//! analyze → report → publish, at most one run per path at a time.
//!
//! ```ignore
//! let settings = datawatch::Settings::default();
//! let services = datawatch::Services::new(analyzer, reporter, publisher);
//! let orchestrator = datawatch::Orchestrator::new(&settings, services);
//! orchestrator.start(&settings.data_directory)?;
//! // ...
//! orchestrator.stop();
//! ```

pub mod engine;
pub mod pipeline;
pub mod types;
pub mod utils;

/// Re-export types for API
pub use types::*;

pub use engine::{InFlightRegistry, PathFilter};
pub use pipeline::{
    Analyzer, Announcer, Debouncer, Orchestrator, OrchestratorStatus, PipelineNaming,
    PipelineRunner, Publisher, Reporter, Services, SummarySink, WorkspacePreparer,
};
pub use utils::config::Settings;

/// Result alias used by public datawatch API
pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, Error>;
