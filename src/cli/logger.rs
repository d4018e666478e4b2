use std::io::Write;

use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::cli::messages::level_message;

/// Prints log records to stderr as system messages.
///
/// Debug and trace records carry the module they came from.
struct CliLogger;

static LOGGER: CliLogger = CliLogger;

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = match record.level() {
            log::Level::Debug | log::Level::Trace => {
                format!("{} ({})", record.args(), record.target())
            }
            _ => record.args().to_string(),
        };
        let _ = writeln!(
            std::io::stderr().lock(),
            "{}",
            level_message(record.level(), message)
        );
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}
