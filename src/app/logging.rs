//! logging stuff
use {
    crate::{config::options::LoggingFormat, getopt},
    color_eyre::Result,
    tracing::{Level, info, subscriber},
    tracing_subscriber::FmtSubscriber,
};

/// turn a level name (or its short form) into a tracing level
pub fn string_to_log_level(lvl: &str) -> Level {
    match lvl.trim().to_lowercase().as_str() {
        "t" | "trace" | "trc" => Level::TRACE,
        "d" | "debug" | "dbg" => Level::DEBUG,
        "i" | "info" | "inf" => Level::INFO,
        "w" | "warn" | "wrn" => Level::WARN,
        "e" | "error" | "err" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// setup logging from the `[logging]` section
///
/// # Errors
///
/// returns an error if a global subscriber was already installed
pub fn setup() -> Result<()> {
    if !getopt!(logging.enable) {
        return Ok(());
    }

    let max_level = string_to_log_level(&getopt!(logging.level));
    let subscriber = FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_ansi(getopt!(logging.ansi))
        .with_line_number(getopt!(logging.line_numbers))
        .with_target(getopt!(logging.event_targets))
        .with_writer(std::io::stderr);

    match getopt!(logging.format) {
        LoggingFormat::Pretty => {
            subscriber::set_global_default(subscriber.pretty().finish())?;
        }
        LoggingFormat::Compact => {
            subscriber::set_global_default(subscriber.compact().finish())?;
        }
    }

    info!(level = %max_level, "logging set up");
    Ok(())
}
