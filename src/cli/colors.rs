//! The colors of the command line theme, one per kind of message.
//!
//! - TABSTORE_TEAL: Main Color
//! - WARNING_AMBER: warnings
//! - ERROR_RED: errors

use colored::Color;

pub(crate) const TABSTORE_TEAL: Color = Color::TrueColor {
    r: 64,
    g: 196,
    b: 180,
};

pub(crate) const WARNING_AMBER: Color = Color::TrueColor {
    r: 255,
    g: 191,
    b: 64,
};

pub(crate) const ERROR_RED: Color = Color::TrueColor {
    r: 255,
    g: 87,
    b: 87,
};
