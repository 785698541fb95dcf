//! Engine building blocks: path filter, in-flight registry, change source, hook collaborators and CLI.

pub mod arg_parser;
pub mod cli;
pub mod filter;
pub mod hooks;
pub mod registry;
pub mod source;
pub mod summary;

// Re-export commonly used items
pub use arg_parser::Cli;
pub use cli::{handle_run, resolve_settings};
pub use filter::{PathFilter, glob_match, is_os_hidden_file};
pub use hooks::{HookCommand, services_from_settings};
pub use registry::{Claim, InFlightRegistry};
pub use source::ChangeSource;
pub use summary::JsonSummarySink;
