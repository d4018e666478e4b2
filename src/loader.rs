//! Filling tables from a backing store and collecting what changed since.
//!
//! A [`TableLoader`] knows how to produce a whole table, a single keyed
//! record or a cluster of records sharing a column value. Whatever the
//! program changes afterwards is picked up with [`drain_dirty_rows`] and
//! written back by the store.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;

use crate::csv::{CsvFileTable, CsvOptions};
use crate::error::{Result, TableError};
use crate::persistence::{ModifyFlags, Row, Table, Value};

pub trait TableLoader {
    fn load_table(&self) -> Result<Table>;

    /// Load the record with main index `key` into `table`, returning the
    /// number of rows added or refreshed.
    fn load_data_incrementally(&self, table: &mut Table, key: &str) -> Result<usize>;

    fn load_clustered_table(&self, cluster_key: &str, cluster_value: &str) -> Result<Table>;

    fn load_clustered_data_incrementally(
        &self,
        table: &mut Table,
        cluster_key: &str,
        cluster_value: &str,
    ) -> Result<usize>;
}

/// The pending changes of one row, taken out of its table.
#[derive(Clone, Debug)]
pub struct DirtyRow {
    pub row: Arc<Row>,
    pub row_index: Option<usize>,
    pub flags: ModifyFlags,
    pub changed_columns: Option<BTreeSet<usize>>,
}

impl DirtyRow {
    pub fn is_deleted(&self) -> bool {
        self.flags.contains(ModifyFlags::DELETED)
    }

    pub fn is_inserted(&self) -> bool {
        self.flags.contains(ModifyFlags::INSERTED)
    }
}

pub fn drain_dirty_rows(table: &Table) -> Vec<DirtyRow> {
    //! Take every pending change of `table`, leaving its rows clean.
    //!
    //! Removed rows are reported too, flagged [`ModifyFlags::DELETED`] and
    //! without a row index.

    table
        .take_dirty_rows()
        .into_iter()
        .filter_map(|row| {
            let (flags, changed_columns) = row.swap_out_dirty_state();
            if flags.is_empty() {
                return None;
            }
            Some(DirtyRow {
                row_index: row.row_index(),
                row,
                flags,
                changed_columns,
            })
        })
        .collect()
}

/// A [`TableLoader`] reading a single CSV file.
pub struct CsvTableLoader {
    path: PathBuf,
    options: CsvOptions,
}

impl CsvTableLoader {
    pub fn new(path: impl AsRef<Path>, options: CsvOptions) -> CsvTableLoader {
        CsvTableLoader {
            path: path.as_ref().to_path_buf(),
            options,
        }
    }

    fn cluster_rows(source: &Table, cluster_key: &str, cluster_value: &str) -> Vec<Arc<Row>> {
        source
            .data_rows()
            .into_iter()
            .filter(|row| row.field(cluster_key).as_string().as_deref() == Some(cluster_value))
            .collect()
    }
}

impl TableLoader for CsvTableLoader {
    fn load_table(&self) -> Result<Table> {
        let mut csv = CsvFileTable::new(self.options.clone());
        csv.load_from_csv_file(&self.path)?;
        csv.into_table().ok_or_else(|| {
            TableError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("no table in \"{}\"", self.path.display()),
            ))
        })
    }

    fn load_data_incrementally(&self, table: &mut Table, key: &str) -> Result<usize> {
        let source = self.load_table()?;
        let Some(row) = source.get_row_by_key(key) else {
            debug!("no record {} in \"{}\"", key, self.path.display());
            return Ok(0);
        };

        copy_row_into(table, &row)?;
        Ok(1)
    }

    fn load_clustered_table(&self, cluster_key: &str, cluster_value: &str) -> Result<Table> {
        let source = self.load_table()?;
        let mut table = Table::new(source.schema().clone());
        for row in Self::cluster_rows(&source, cluster_key, cluster_value) {
            copy_row_into(&mut table, &row)?;
        }

        table.clear_dirty_flag();
        Ok(table)
    }

    fn load_clustered_data_incrementally(
        &self,
        table: &mut Table,
        cluster_key: &str,
        cluster_value: &str,
    ) -> Result<usize> {
        let source = self.load_table()?;
        let rows = Self::cluster_rows(&source, cluster_key, cluster_value);
        for row in rows.iter() {
            copy_row_into(table, row)?;
        }
        Ok(rows.len())
    }
}

fn copy_row_into(table: &mut Table, source: &Row) -> Result<usize> {
    //! Refresh the row with the same key, or add a new one.

    let values = source.values();
    let key = table
        .main_index_col()
        .and_then(|col| values.get(col).cloned().flatten());

    if let Some(existing) = key.as_ref().and_then(|key| table.get_row_by_key(&key_text(key))) {
        for (col, value) in values.into_iter().enumerate() {
            existing.set(col, value);
        }
        return Ok(existing.row_index().unwrap_or_default());
    }

    let row = table.build_row();
    for (col, value) in values.into_iter().enumerate() {
        row.set(col, value);
    }

    match key {
        Some(key) => table.add_row_by_key(&key_text(&key), row, false),
        None => table.append_as_data_row(row),
    }
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
