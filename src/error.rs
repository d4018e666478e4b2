use thiserror::Error;

use crate::persistence::TypeCode;

/// Every failure the table store reports to its caller.
///
/// Some of these are only ever logged by the CSV loader (bad cell text,
/// duplicated keys in a file) and never surface from a load, see
/// [`crate::csv::CsvFileTable::load_from_csv_file`].
#[derive(Debug, Error)]
pub enum TableError {
    #[error("duplicated field name: \"{field}\"; schema: \"{schema}\"")]
    DuplicateField { field: String, schema: String },

    #[error("duplicated key value: {key}; table: <{table}>")]
    DuplicateKey { key: String, table: String },

    #[error("main index not set at table {table}")]
    MainIndexNotSet { table: String },

    #[error("invalid key {key}: not an integer key for table <{table}>")]
    InvalidKey { key: String, table: String },

    #[error("row does not belong to table <{table}>")]
    ForeignRow { table: String },

    #[error("row is not a dummy row; table <{table}>")]
    NotDummyRow { table: String },

    #[error("cannot rebuild main index on column {column}: duplicated key {key}")]
    IndexRebuildConflict { column: usize, key: String },

    #[error("invalid main index column {column}: type {type_code} can not be indexed")]
    InvalidMainIndex { column: usize, type_code: TypeCode },

    #[error("invalid value for column {column}: expected {expected}, got {got}")]
    TypeMismatch {
        column: usize,
        expected: TypeCode,
        got: TypeCode,
    },

    #[error("cell conversion failed: {from} is not convertible to {to}")]
    CellConversion { from: TypeCode, to: TypeCode },

    #[error("header mismatch: {types} type tokens but {fields} field names")]
    HeaderMismatch { types: usize, fields: usize },

    #[error("missing header line {line}")]
    MissingHeader { line: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TableError>;
