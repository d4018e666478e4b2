//! Delimited text persistence for tables.
//!
//! - parser (one line into columns)
//! - encoding (guessing how the bytes of a file map to text)
//! - file_table (load, save and write back a table as a CSV file)
//!

mod encoding;
mod file_table;
mod parser;

pub use encoding::{DetectedEncoding, EncodingDetector};
pub use file_table::{CsvFileTable, CsvOptions, TextEncoding};
pub use parser::{Columns, RowParser};
