use std::env;

use log::{LevelFilter, error};

use crate::cli::messages::{highlight_argument, system_message};
use crate::cli::parsers::CliParser;
use crate::csv::CsvOptions;

mod colors;
mod commands;
mod logger;
mod messages;
pub mod parsers;

pub use commands::execute;

pub const LOG_LEVEL_VAR: &str = "TABSTORE_LOG";
pub const FALLBACK_ENCODING_VAR: &str = "TABSTORE_FALLBACK_ENCODING";

pub fn init_logging() {
    //! Install the command line logger, at the level named by
    //! `TABSTORE_LOG` (`info` when unset or unknown).

    let level = env::var(LOG_LEVEL_VAR)
        .ok()
        .and_then(|level| level.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    if logger::init(level).is_err() {
        eprintln!(
            "{}",
            system_message("system", "A logger was already installed.".to_string())
        );
    }
}

pub fn csv_options(parser: &CliParser) -> CsvOptions {
    //! Options from the environment, overridden by the command line.

    let mut options = CsvOptions {
        separator: parser.separator,
        ..CsvOptions::default()
    };

    let label = parser
        .fallback_encoding
        .clone()
        .or_else(|| env::var(FALLBACK_ENCODING_VAR).ok());
    if let Some(label) = label {
        match options.clone().with_fallback_label(&label) {
            Some(with_label) => options = with_label,
            None => error!(
                "unknown encoding {}, keeping {}",
                highlight_argument(&label),
                options.fallback_encoding.name()
            ),
        }
    }

    options
}

pub fn run(parser: CliParser) -> i32 {
    //! Run the parsed command, returning the process exit code.

    let options = csv_options(&parser);
    match execute(parser.command, options) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", system_message("error", err.to_string()));
            1
        }
    }
}
