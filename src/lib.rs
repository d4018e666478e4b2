pub mod cli;
pub mod config;
pub mod csv;
pub mod error;
pub mod json;
pub mod loader;
pub mod persistence;

pub use error::{Result, TableError};
