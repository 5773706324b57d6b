use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// Console sink for the `log` facade. Every record goes to stderr, prefixed
/// with a short level tag; stdout carries only command reports.
struct ConsoleLogger {
    level: LevelFilter,
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level && metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        eprintln!("{} {}", level_tag(record.level()), record.args());
    }

    fn flush(&self) {}
}

pub fn level_tag(level: Level) -> String {
    match level {
        Level::Error => "[ERR]".red().bold().to_string(),
        Level::Warn => "[WRN]".yellow().to_string(),
        Level::Info => "[INF]".blue().to_string(),
        Level::Debug | Level::Trace => "[DBG]".dimmed().to_string(),
    }
}

/// `-v` count to level: warnings by default, then info, then debug.
pub fn level_for_verbosity(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the console logger. Calling it twice keeps the first logger and
/// only adjusts the level.
pub fn init(verbose: u8, no_color: bool) {
    if no_color {
        colored::control::set_override(false);
    }
    let level = level_for_verbosity(verbose);
    let _ = log::set_boxed_logger(Box::new(ConsoleLogger { level }));
    log::set_max_level(level);
}
