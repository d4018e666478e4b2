//! Message formatting for the command line.
//!
//! - Highlight an argument (a file name, a table name) in the theme color
//! - System messages `[source] message`, with the source colored by the
//!   kind of message

use colored::{Color, Colorize};
use log::Level;

use crate::cli::colors::{ERROR_RED, TABSTORE_TEAL, WARNING_AMBER};

pub fn highlight_argument(argument: &str) -> String {
    format!("{}", argument.color(TABSTORE_TEAL))
}

pub fn system_message(source_name: &str, message: String) -> String {
    //! Format a message of `source_name` (like 'csv' or 'export') the way
    //! every line of the command line looks.

    colored_message(source_name, TABSTORE_TEAL, message)
}

pub fn level_message(level: Level, message: String) -> String {
    //! A system message whose source is a log level.

    let color = match level {
        Level::Error => ERROR_RED,
        Level::Warn => WARNING_AMBER,
        Level::Info | Level::Debug | Level::Trace => TABSTORE_TEAL,
    };
    colored_message(&level.as_str().to_lowercase(), color, message)
}

fn colored_message(source_name: &str, color: Color, message: String) -> String {
    let source = format!("{:6}", source_name.color(color).bold());
    format!("[{}] {}", source, message)
}
