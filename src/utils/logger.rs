use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::io::Write;

/// Install the global logger. Dependencies log warnings only (unless `RUST_LOG` says otherwise);
/// this crate logs at `debug` when `verbose`, else `info`. Safe to call twice.
pub fn setup_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let _ = Builder::new()
        .filter_level(LevelFilter::Warn)
        .parse_default_env()
        .filter_module(env!("CARGO_PKG_NAME"), level)
        .format(|buf, record| {
            let name = env!("CARGO_PKG_NAME").cyan();
            let line = match record.level() {
                Level::Error => format!(
                    "[{} {} {}] {}",
                    name,
                    "ERROR".red(),
                    record.target().white(),
                    record.args()
                ),
                Level::Warn => format!(
                    "[{} {} {}] {}",
                    name,
                    "WARN".yellow(),
                    record.target().white(),
                    record.args()
                ),
                _ => format!("[{}] {}", name, record.args()),
            };
            writeln!(buf, "{}", line)
        })
        .try_init();
}
