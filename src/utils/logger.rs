use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Level for this crate's own modules: explicit `log_level` wins, then `verbose`, then Info.
pub fn crate_level(verbose: bool, log_level: Option<&str>) -> LevelFilter {
    if let Some(level) = log_level.and_then(parse_level) {
        return level;
    }
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Accepts `log` names plus the `WARNING` / `CRITICAL` spellings common in `.env` files.
fn parse_level(s: &str) -> Option<LevelFilter> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("warning") {
        return Some(LevelFilter::Warn);
    }
    if s.eq_ignore_ascii_case("critical") {
        return Some(LevelFilter::Error);
    }
    s.parse().ok()
}

pub fn setup_logging(verbose: bool, log_level: Option<&str>) {
    let level = crate_level(verbose, log_level);

    let _ = Builder::from_default_env()
        .filter_level(LevelFilter::Warn) // Default: only warnings from dependencies
        .filter_module(env!("CARGO_PKG_NAME"), level) // Our crate: use requested level
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME");
            let ts = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            let line = match record.level() {
                Level::Error | Level::Warn => {
                    let level_str = match record.level() {
                        Level::Warn => "WARN".yellow(),
                        _ => "ERROR".red(),
                    };
                    let path = record.target().to_string().white();
                    format!(
                        "{} [{} {} {}] {}",
                        ts,
                        name.cyan(),
                        level_str,
                        path,
                        record.args()
                    )
                }
                _ => format!("{} [{}] {}", ts, name.cyan(), record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}
