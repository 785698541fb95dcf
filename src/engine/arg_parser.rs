use clap::Parser;
use std::path::PathBuf;

/// Watch a data directory and run analyze → report → publish for each new or changed file.
#[derive(Clone, Parser)]
#[command(name = "datawatch")]
#[command(about = "Watch a data directory; use --analyze FILE for a one-off run.")]
pub struct Cli {
    /// Directory to watch. Default: DATA_DIRECTORY or ./data.
    #[arg(value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// Run the pipeline once for FILE and exit instead of watching.
    #[arg(long, short = 'a', value_name = "FILE")]
    pub analyze: Option<PathBuf>,

    /// Output directory for reports and run summaries. Default: OUTPUT_DIRECTORY or ./output.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,

    /// Largest file (in MB) that will be processed.
    #[arg(long, short = 'm', value_parser = clap::value_parser!(u64))]
    pub max_size_mb: Option<u64>,

    /// Exclude patterns (glob syntax). Can specify multiple: -e pattern1 pattern2
    #[arg(long, short = 'e', num_args = 1..)]
    pub exclude: Vec<String>,

    /// Follow symbolic links during the start-up scan.
    #[arg(long, short = 'f', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub follow_links: Option<bool>,

    /// Milliseconds between dispatches of files found at start-up.
    #[arg(long, value_parser = clap::value_parser!(u64))]
    pub bootstrap_interval_ms: Option<u64>,

    /// Verbose output.
    #[arg(long, short = 'v', num_args = 0..=1, default_missing_value = "true", value_parser = clap::value_parser!(bool))]
    pub verbose: Option<bool>,
}
