use super::index::KeyIndex;
use super::row::{ModifyFlags, Row};
use super::schema::Schema;
use super::types::{TypeCode, Value};
use super::{lock, read, write};
use crate::error::{Result, TableError};
use crate::persistence::Cell;

use indexmap::IndexMap;
use log::warn;
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard};

/// The part of a [`Table`] its rows can reach through their back-reference.
///
/// Rows hold it weakly, so a dropped table leaves its rows detached.
pub(crate) struct TableShared {
    schema: RwLock<Schema>,
    mark_dirty: AtomicBool,
    dirty_rows: Mutex<IndexMap<usize, Arc<Row>>>,
}

impl TableShared {
    pub(crate) fn schema(&self) -> RwLockReadGuard<'_, Schema> {
        read(&self.schema)
    }

    pub(crate) fn is_marking_dirty(&self) -> bool {
        self.mark_dirty.load(Ordering::Acquire)
    }

    pub(crate) fn on_row_modified(&self, row: &Arc<Row>) {
        lock(&self.dirty_rows).insert(row_id(row), Arc::clone(row));
    }

    fn forget_row(&self, row: &Arc<Row>) {
        lock(&self.dirty_rows).shift_remove(&row_id(row));
    }
}

fn row_id(row: &Arc<Row>) -> usize {
    Arc::as_ptr(row) as usize
}

fn key_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// An ordered, typed, in-memory table with an optional unique main index.
///
/// Rows are positioned in insertion order. *Dummy* rows (placeholders,
/// blank CSV lines, rows that failed to parse) keep their place but are
/// never indexed and never counted as data.
///
/// Values of a row can be changed from anywhere through its `Arc<Row>`;
/// adding, replacing and removing rows needs `&mut Table`.
///
/// # Issues
/// - [`Table::remove_row`] does not shift the positions stored in the main
///   index, key lookups for rows behind the removed one are stale until
///   [`Table::set_main_index`] rebuilds the index.
/// - Dirty tracking keeps rows alive in the dirty set until it is drained
///   or cleared.
pub struct Table {
    shared: Arc<TableShared>,
    rows: Vec<Arc<Row>>,
    key_index: KeyIndex,
    data_row_count: usize,
}

impl Table {
    pub fn new(schema: Schema) -> Table {
        //! Create an empty table for `schema`, dirty tracking switched on.

        let key_index = KeyIndex::for_type(
            schema
                .main_index_col()
                .map(|col| schema.type_of_col(col))
                .unwrap_or(TypeCode::String),
        );

        Table {
            shared: Arc::new(TableShared {
                schema: RwLock::new(schema),
                mark_dirty: AtomicBool::new(true),
                dirty_rows: Mutex::new(IndexMap::new()),
            }),
            rows: Vec::new(),
            key_index,
            data_row_count: 0,
        }
    }

    pub fn with_fields(
        name: &str,
        fields: Vec<(&str, TypeCode)>,
        main_index_col: Option<usize>,
    ) -> Result<Table> {
        let fields = fields
            .into_iter()
            .map(|(field, type_code)| (field.to_string(), type_code))
            .collect();
        Ok(Table::new(Schema::new(name, fields, main_index_col)?))
    }

    pub(crate) fn shared(&self) -> &Arc<TableShared> {
        &self.shared
    }

    pub fn schema(&self) -> RwLockReadGuard<'_, Schema> {
        //! Read access to the schema.
        //!
        //! Do not keep the guard across a write to one of the rows on the
        //! same thread.

        self.shared.schema()
    }

    pub fn name(&self) -> String {
        self.schema().name().to_string()
    }

    pub fn columns(&self) -> Vec<(String, TypeCode)> {
        self.schema().columns().to_vec()
    }

    pub fn main_index_col(&self) -> Option<usize> {
        self.schema().main_index_col()
    }

    pub fn build_row(&self) -> Arc<Row> {
        //! A new empty row owned by this table but not attached to it yet.

        Arc::new(Row::new(Arc::downgrade(&self.shared)))
    }

    fn check_owner(&self, row: &Arc<Row>) -> Result<()> {
        if row.is_owned_by(&self.shared) {
            Ok(())
        } else {
            Err(TableError::ForeignRow { table: self.name() })
        }
    }

    fn attached_position(&self, row: &Arc<Row>) -> Option<usize> {
        let index = row.row_index()?;
        self.rows
            .get(index)
            .filter(|attached| Arc::ptr_eq(attached, row))
            .map(|_| index)
    }

    fn push_row(&mut self, row: Arc<Row>) -> usize {
        let index = self.rows.len();
        row.set_row_index(Some(index));
        if !row.is_dummy_row() {
            self.data_row_count += 1;
        }

        if self.shared.is_marking_dirty() {
            row.add_modify_flags(ModifyFlags::INSERTED);
            self.shared.on_row_modified(&row);
        }

        self.rows.push(row);
        index
    }

    fn replace_row(&mut self, row: Arc<Row>, index: usize) {
        let old = std::mem::replace(&mut self.rows[index], Arc::clone(&row));
        if old.is_dummy_row() && !row.is_dummy_row() {
            self.data_row_count += 1;
        }

        row.set_row_index(Some(index));
        if self.shared.is_marking_dirty() {
            row.add_modify_flags(ModifyFlags::UPDATED_ALL);
            self.shared.on_row_modified(&row);
        }

        self.shared.forget_row(&old);
        old.set_row_index(None);
        old.on_leave_table_index();
        old.detach_from_table();
    }

    pub fn append_as_dummy_row(&mut self, row: Arc<Row>) -> Result<usize> {
        //! Append a placeholder row. Rows already attached as data are
        //! refused.

        self.check_owner(&row)?;
        if !row.is_dummy_row() {
            return Err(TableError::NotDummyRow { table: self.name() });
        }
        if let Some(index) = self.attached_position(&row) {
            return Ok(index);
        }

        Ok(self.push_row(row))
    }

    pub fn append_as_data_row(&mut self, row: Arc<Row>) -> Result<usize> {
        //! Append a data row without indexing it.

        self.check_owner(&row)?;
        if let Some(index) = self.attached_position(&row) {
            return Ok(index);
        }

        row.mark_as_data_row();
        Ok(self.push_row(row))
    }

    pub fn add_row_by_key(
        &mut self,
        key: &str,
        row: Arc<Row>,
        force_replace: bool,
    ) -> Result<usize> {
        //! Attach `row` as an indexed data row under `key`.
        //!
        //! A key that is already taken is an error, unless `force_replace`
        //! is set: the new row then takes the position of the old one and
        //! the old row is detached.
        //!
        //! Returns the row index of `row`.

        self.check_owner(&row)?;
        if self.main_index_col().is_none() {
            return Err(TableError::MainIndexNotSet { table: self.name() });
        }

        if let KeyIndex::Int(_) = self.key_index {
            if key.trim().parse::<i64>().is_err() {
                return Err(TableError::InvalidKey {
                    key: key.to_string(),
                    table: self.name(),
                });
            }
        }

        let existing = self.key_index.lookup_str(key);
        if existing.is_some() && !force_replace {
            return Err(TableError::DuplicateKey {
                key: key.to_string(),
                table: self.name(),
            });
        }

        row.on_join_to_table_index();
        match existing {
            Some(index) if index < self.rows.len() => {
                if !Arc::ptr_eq(&self.rows[index], &row) {
                    self.replace_row(row, index);
                }
                Ok(index)
            }
            _ => {
                let index = self.push_row(row);
                self.key_index.insert_str(key, index);
                Ok(index)
            }
        }
    }

    pub fn add_row_by_cell(
        &mut self,
        key: &Cell,
        row: Arc<Row>,
        force_replace: bool,
    ) -> Result<usize> {
        let Some(key) = key.as_string() else {
            return Err(TableError::InvalidKey {
                key: "null".to_string(),
                table: self.name(),
            });
        };
        self.add_row_by_key(&key, row, force_replace)
    }

    pub fn attach_row(&mut self, row: Arc<Row>, force_replace: bool) -> Result<usize> {
        //! Attach `row` the way its content asks for.
        //!
        //! - no main index: appended as a data row,
        //! - null key: appended as a dummy row,
        //! - a value that failed to deserialize: appended as a dummy row with
        //!   a warning,
        //! - otherwise added by its key.

        self.check_owner(&row)?;
        let Some(col) = self.main_index_col() else {
            return self.append_as_data_row(row);
        };

        let Some(key) = row.get(col) else {
            return self.append_as_dummy_row(row);
        };
        let key = key_text(&key);

        if !row.is_well_typed_key() || !row.is_well_typed_data() {
            warn!("table [{}] row is not well formatted: {}", self.name(), key);
            return self.append_as_dummy_row(row);
        }

        self.add_row_by_key(&key, row, force_replace)
    }

    fn row_at(&self, index: usize) -> Option<Arc<Row>> {
        self.rows.get(index).cloned()
    }

    pub fn get_row_by_key(&self, key: &str) -> Option<Arc<Row>> {
        self.row_at(self.key_index.lookup_str(key)?)
    }

    pub fn get_row_by_int_key(&self, key: i64) -> Option<Arc<Row>> {
        self.row_at(self.key_index.lookup_int(key)?)
    }

    pub fn get_row_by_cell(&self, key: &Cell) -> Option<Arc<Row>> {
        //! Only string and signed integer cells of 16 bits or more can be
        //! keys.

        match key.type_code() {
            TypeCode::String | TypeCode::Int64 | TypeCode::Int32 | TypeCode::Int16 => {
                self.row_at(self.key_index.lookup_value(&key.data_obj()?)?)
            }
            _ => None,
        }
    }

    pub fn find_rows<F>(&self, predicate: F) -> Vec<Arc<Row>>
    where
        F: Fn(&Row) -> bool,
    {
        self.rows
            .iter()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    pub fn remove_row(&mut self, row: &Arc<Row>) -> bool {
        //! Remove `row` from the table and detach it.
        //!
        //! Returns `false` when the row is not part of this table.
        //!
        //! # Issues
        //! - The removed row's own key entry is dropped, so its key finds
        //!   nothing afterwards. Entries of the rows behind it keep their old
        //!   positions.

        if !row.is_owned_by(&self.shared) {
            return false;
        }

        let mut position = None;
        if let Some(col) = self.main_index_col() {
            if row.is_indexed_row() {
                if let Some(key) = row.get(col) {
                    let by_key = self
                        .key_index
                        .lookup_value(&key)
                        .filter(|&index| {
                            self.rows
                                .get(index)
                                .is_some_and(|attached| Arc::ptr_eq(attached, row))
                        });
                    if by_key.is_some() {
                        self.key_index.remove_value(&key);
                    }
                    position = by_key;
                }
            }
        }

        let position = match position {
            Some(position) => position,
            None => match self.rows.iter().position(|attached| Arc::ptr_eq(attached, row)) {
                Some(position) => position,
                None => return false,
            },
        };

        self.rows.remove(position);
        if !row.is_dummy_row() {
            self.data_row_count -= 1;
        }
        for (index, shifted) in self.rows.iter().enumerate().skip(position) {
            shifted.set_row_index(Some(index));
        }

        if self.shared.is_marking_dirty() {
            row.add_modify_flags(ModifyFlags::DELETED);
            self.shared.on_row_modified(row);
        }

        row.set_row_index(None);
        row.on_leave_table_index();
        row.detach_from_table();
        true
    }

    pub fn all_rows(&self) -> &[Arc<Row>] {
        &self.rows
    }

    pub fn data_rows(&self) -> Vec<Arc<Row>> {
        self.find_rows(|row| !row.is_dummy_row())
    }

    pub fn dirty_rows(&self) -> Vec<Arc<Row>> {
        //! Data rows changed since the dirty set was last drained or cleared.

        lock(&self.shared.dirty_rows)
            .values()
            .filter(|row| !row.is_dummy_row())
            .cloned()
            .collect()
    }

    pub(crate) fn take_dirty_rows(&self) -> Vec<Arc<Row>> {
        std::mem::take(&mut *lock(&self.shared.dirty_rows))
            .into_values()
            .collect()
    }

    pub fn first_data_row(&self) -> Option<Arc<Row>> {
        self.rows.iter().find(|row| !row.is_dummy_row()).cloned()
    }

    pub fn last_data_row(&self) -> Option<Arc<Row>> {
        self.rows.iter().rev().find(|row| !row.is_dummy_row()).cloned()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn data_row_count(&self) -> usize {
        self.data_row_count
    }

    pub fn set_main_index(&mut self, col: usize) -> Result<()> {
        //! Make `col` the main index and rebuild the key map from every data
        //! row.
        //!
        //! Rows with a null key stay unindexed. Two rows with the same key
        //! abort the rebuild and leave the previous index in place.

        let type_code = {
            let schema = self.schema();
            if !schema.is_valid_main_index(col) {
                return Err(TableError::InvalidMainIndex {
                    column: col,
                    type_code: schema.type_of_col(col),
                });
            }
            schema.type_of_col(col)
        };

        let mut key_index = KeyIndex::for_type(type_code);
        let mut indexed = Vec::with_capacity(self.rows.len());
        for (index, row) in self.rows.iter().enumerate() {
            let key = match row.get(col) {
                Some(key) if !row.is_dummy_row() => key,
                _ => {
                    indexed.push(false);
                    continue;
                }
            };

            if key_index.lookup_value(&key).is_some() {
                return Err(TableError::IndexRebuildConflict {
                    column: col,
                    key: key_text(&key),
                });
            }
            indexed.push(key_index.insert_value(&key, index));
        }

        write(&self.shared.schema).set_main_index(Some(col));
        self.key_index = key_index;
        for (row, indexed) in self.rows.iter().zip(indexed) {
            if indexed {
                row.on_join_to_table_index();
            } else {
                row.on_leave_table_index();
            }
        }

        Ok(())
    }

    pub fn set_main_index_field(&mut self, field: &str) -> Result<()> {
        let Some(col) = self.schema().field_to_col(field) else {
            return Err(TableError::InvalidMainIndex {
                column: self.schema().column_count(),
                type_code: TypeCode::Empty,
            });
        };
        self.set_main_index(col)
    }

    pub fn clear_main_index(&mut self) {
        write(&self.shared.schema).set_main_index(None);
        self.key_index.clear();
        for row in self.rows.iter() {
            row.on_leave_table_index();
        }
    }

    pub fn is_marking_dirty(&self) -> bool {
        self.shared.is_marking_dirty()
    }

    pub fn set_mark_dirty(&self, mark_dirty: bool) {
        self.shared.mark_dirty.store(mark_dirty, Ordering::Release);
    }

    pub fn clear_dirty_flag(&self) {
        //! Forget every pending change, of attached rows and of rows already
        //! removed.

        let dirty = std::mem::take(&mut *lock(&self.shared.dirty_rows));
        for row in dirty.values().chain(self.rows.iter()) {
            row.clear_modify_flags();
        }
    }
}

impl Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rows: Vec<String> = self.rows.iter().map(|row| format!("{}", row)).collect();

        writeln!(f, "{}\n{}", *self.schema(), rows.join("\n"))
    }
}

impl Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name())
            .field("rows", &self.rows.len())
            .field("data_rows", &self.data_row_count)
            .field("keys", &self.key_index.len())
            .finish()
    }
}
