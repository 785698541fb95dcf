pub mod config;
pub mod datawatch_toml;
pub mod env;
pub mod logger;

pub use config::*;
pub use env::{apply_env_to_settings, load_dotenv};
pub use logger::{crate_level, setup_logging};
