use std::collections::BTreeSet;
use std::fmt::{Debug, Display};
use std::ops::{BitOr, BitOrAssign};
use std::sync::{Arc, Mutex, RwLock, Weak};

use super::cell::Cell;
use super::schema::Schema;
use super::table::{Table, TableShared};
use super::types::{TypeCode, Value};
use super::{lock, read, write};
use crate::error::{Result, TableError};

/// The pending changes of a row since its dirty state was last drained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ModifyFlags(u8);

impl ModifyFlags {
    pub const NONE: ModifyFlags = ModifyFlags(0x00);
    pub const DELETED: ModifyFlags = ModifyFlags(0x01);
    pub const INSERTED: ModifyFlags = ModifyFlags(0x02);
    pub const UPDATED: ModifyFlags = ModifyFlags(0x04);
    pub const UPDATED_ALL: ModifyFlags = ModifyFlags(0x08);

    pub fn contains(&self, other: ModifyFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl BitOr for ModifyFlags {
    type Output = ModifyFlags;

    fn bitor(self, rhs: ModifyFlags) -> ModifyFlags {
        ModifyFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for ModifyFlags {
    fn bitor_assign(&mut self, rhs: ModifyFlags) {
        self.0 |= rhs.0;
    }
}

struct RowState {
    row_index: Option<usize>,
    values: Vec<Option<Value>>,
    populated: bool,
    data: bool,
    indexed: bool,
    modify_flags: ModifyFlags,
    changed_columns: Option<BTreeSet<usize>>,
    well_typed_key: bool,
    well_typed_data: bool,
    error_log: Vec<String>,
}

impl RowState {
    fn store(&mut self, col: usize, value: Option<Value>) {
        while self.values.len() <= col {
            self.values.push(None);
        }
        self.values[col] = value;
        self.populated = true;
    }

    fn mark_updated(&mut self, col: usize) {
        self.modify_flags |= ModifyFlags::UPDATED;
        self.changed_columns
            .get_or_insert_with(BTreeSet::new)
            .insert(col);
    }

    fn is_indexed_row(&self) -> bool {
        self.data && self.indexed
    }
}

/// A single record of a [`Table`].
///
/// Rows are shared as `Arc<Row>`: the table keeps one handle, cells and
/// callers keep others. Values and dirty state live behind one mutex, so
/// [`Row::set`] and [`Row::swap_out_dirty_state`] may run on different
/// threads. Everything structural (attaching, indexing, removal) goes
/// through `&mut Table` instead.
///
/// A row is
/// - *empty* until a value is first stored,
/// - *dummy* until it is attached as a data row (a placeholder such as a
///   blank line of a CSV file),
/// - *data* once attached as a real record, and additionally *indexed*
///   when its key joined the table's main index.
///
/// # Issues
/// - An indexed row refuses writes to its main index column, keys cannot be
///   changed in place. Remove and re-add the row instead.
pub struct Row {
    owner: RwLock<Weak<TableShared>>,
    state: Mutex<RowState>,
}

impl Row {
    pub(crate) fn new(owner: Weak<TableShared>) -> Row {
        Row {
            owner: RwLock::new(owner),
            state: Mutex::new(RowState {
                row_index: None,
                values: Vec::new(),
                populated: false,
                data: false,
                indexed: false,
                modify_flags: ModifyFlags::NONE,
                changed_columns: None,
                well_typed_key: true,
                well_typed_data: true,
                error_log: Vec::new(),
            }),
        }
    }

    fn owner(&self) -> Option<Arc<TableShared>> {
        read(&self.owner).upgrade()
    }

    pub(crate) fn is_owned_by(&self, shared: &Arc<TableShared>) -> bool {
        std::ptr::eq(read(&self.owner).as_ptr(), Arc::as_ptr(shared))
    }

    pub fn belongs_to(&self, table: &Table) -> bool {
        self.is_owned_by(table.shared())
    }

    pub fn is_detached(&self) -> bool {
        self.owner().is_none()
    }

    pub(crate) fn detach_from_table(&self) {
        *write(&self.owner) = Weak::new();
    }

    pub fn row_index(&self) -> Option<usize> {
        lock(&self.state).row_index
    }

    pub(crate) fn set_row_index(&self, row_index: Option<usize>) {
        lock(&self.state).row_index = row_index;
    }

    pub fn is_empty_row(&self) -> bool {
        !lock(&self.state).populated
    }

    pub fn is_dummy_row(&self) -> bool {
        !lock(&self.state).data
    }

    pub fn is_indexed_row(&self) -> bool {
        lock(&self.state).is_indexed_row()
    }

    pub(crate) fn mark_as_data_row(&self) {
        lock(&self.state).data = true;
    }

    pub(crate) fn on_join_to_table_index(&self) {
        let mut state = lock(&self.state);
        state.data = true;
        state.indexed = true;
    }

    pub(crate) fn on_leave_table_index(&self) {
        lock(&self.state).indexed = false;
    }

    pub fn is_well_typed_key(&self) -> bool {
        lock(&self.state).well_typed_key
    }

    pub fn is_well_typed_data(&self) -> bool {
        lock(&self.state).well_typed_data
    }

    pub fn deserializing_error_log(&self) -> Vec<String> {
        lock(&self.state).error_log.clone()
    }

    pub fn is_dirty(&self) -> bool {
        !lock(&self.state).modify_flags.is_empty()
    }

    pub fn modify_flags(&self) -> ModifyFlags {
        lock(&self.state).modify_flags
    }

    pub(crate) fn add_modify_flags(&self, flags: ModifyFlags) {
        lock(&self.state).modify_flags |= flags;
    }

    pub(crate) fn clear_modify_flags(&self) {
        let mut state = lock(&self.state);
        state.modify_flags = ModifyFlags::NONE;
        state.changed_columns = None;
    }

    pub fn swap_out_dirty_state(&self) -> (ModifyFlags, Option<BTreeSet<usize>>) {
        //! Take the pending change flags and the set of changed columns,
        //! leaving the row clean.
        //!
        //! Incremental synchronization calls this while other threads may
        //! still be writing to the row; both sides hold the row lock.

        let mut state = lock(&self.state);
        let flags = std::mem::replace(&mut state.modify_flags, ModifyFlags::NONE);
        (flags, state.changed_columns.take())
    }

    pub fn get(&self, col: usize) -> Option<Value> {
        //! Get the value at `col`, or [`None`] for nulls and columns out of range.

        let state = lock(&self.state);
        if !state.populated {
            return None;
        }
        state.values.get(col).cloned().flatten()
    }

    pub fn get_field(&self, field: &str) -> Option<Value> {
        let col = self.col_of_field(field)?;
        self.get(col)
    }

    pub fn values(&self) -> Vec<Option<Value>> {
        lock(&self.state).values.clone()
    }

    pub fn is_null(&self, col: usize) -> bool {
        self.get(col).is_none()
    }

    pub fn set(self: &Arc<Self>, col: usize, value: Option<Value>) -> bool {
        //! Store `value` at `col` without checking its type.
        //!
        //! Returns `false` when nothing was stored: a column out of range,
        //! a row without a table, or the main index column of an indexed row.
        //! With dirty tracking on, the column is recorded as changed and the
        //! table learns about the dirty row.

        let Some(owner) = self.owner() else {
            return false;
        };

        let marked = {
            let schema = owner.schema();
            if col >= schema.column_count() {
                return false;
            }

            let mut state = lock(&self.state);
            if state.is_indexed_row() && schema.main_index_col() == Some(col) {
                return false;
            }

            state.store(col, value);
            if owner.is_marking_dirty() {
                state.mark_updated(col);
                true
            } else {
                false
            }
        };

        if marked {
            owner.on_row_modified(self);
        }

        true
    }

    pub fn set_cell(self: &Arc<Self>, col: usize, cell: &Cell) -> Result<bool> {
        //! Store the value of `cell` at `col`.
        //!
        //! The cell has to carry the column's type, except for string and
        //! nested table columns which take anything.

        let Some(owner) = self.owner() else {
            return Ok(false);
        };

        let expected = {
            let schema = owner.schema();
            if col >= schema.column_count() {
                return Ok(false);
            }
            schema.type_of_col(col)
        };

        if expected != cell.type_code()
            && expected != TypeCode::String
            && expected != TypeCode::Table
        {
            return Err(TableError::TypeMismatch {
                column: col,
                expected,
                got: cell.type_code(),
            });
        }

        Ok(self.set(col, cell.data_obj()))
    }

    pub fn set_field(self: &Arc<Self>, field: &str, cell: &Cell) -> Result<bool> {
        //! Store the value of `cell` in the column named `field`, converting
        //! it to the column type when the types differ.
        //!
        //! Nulls are never written to the main index column.

        let Some(owner) = self.owner() else {
            return Ok(false);
        };

        let (col, expected, is_main_index) = {
            let schema = owner.schema();
            let Some(col) = schema.field_to_col(field) else {
                return Ok(false);
            };
            (
                col,
                schema.type_of_col(col),
                schema.main_index_col() == Some(col),
            )
        };

        let value = cell.data_obj();
        if is_main_index && value.is_none() {
            return Ok(false);
        }

        let value = match value {
            Some(value)
                if expected != cell.type_code()
                    && expected != TypeCode::String
                    && expected != TypeCode::Table =>
            {
                let converted =
                    value
                        .convert_to(expected)
                        .ok_or_else(|| TableError::TypeMismatch {
                            column: col,
                            expected,
                            got: value.type_code(),
                        })?;
                Some(converted)
            }
            other => other,
        };

        Ok(self.set(col, value))
    }

    pub fn set_null(self: &Arc<Self>, field: &str) -> bool {
        let Some(col) = self.col_of_field(field) else {
            return false;
        };
        self.set(col, None)
    }

    pub fn mark_as_dirty(self: &Arc<Self>, field: &str) -> bool {
        //! Record a change of `field` made behind the row's back, for instance
        //! inside a nested table.

        let Some(owner) = self.owner() else {
            return false;
        };
        if !owner.is_marking_dirty() {
            return false;
        }
        let Some(col) = owner.schema().field_to_col(field) else {
            return false;
        };

        lock(&self.state).mark_updated(col);
        owner.on_row_modified(self);
        true
    }

    pub fn cell(self: &Arc<Self>, col: usize) -> Option<Cell> {
        //! A cell bound to `col` of this row. Reads and writes through it
        //! always go to the row.

        let type_code = {
            let owner = self.owner()?;
            let schema = owner.schema();
            if col >= schema.column_count() {
                return None;
            }
            schema.type_of_col(col)
        };
        Some(Cell::bound(Arc::clone(self), col, type_code))
    }

    pub fn field(self: &Arc<Self>, field: &str) -> Cell {
        //! A cell bound to the column named `field`. Unknown fields give a
        //! detached null cell.

        self.col_of_field(field)
            .and_then(|col| self.cell(col))
            .unwrap_or_else(Cell::null)
    }

    fn col_of_field(&self, field: &str) -> Option<usize> {
        let owner = self.owner()?;
        let col = owner.schema().field_to_col(field);
        col
    }

    pub(crate) fn with_schema<R>(&self, f: impl FnOnce(&Schema) -> R) -> Option<R> {
        let owner = self.owner()?;
        let schema = owner.schema();
        Some(f(&schema))
    }

    pub(crate) fn field_name_of_col(&self, col: usize) -> Option<String> {
        let owner = self.owner()?;
        let schema = owner.schema();
        schema.field_name_of_col(col).map(str::to_string)
    }

    pub fn deserialize_from_strings(&self, contents: &[String]) {
        //! Fill the row from the text columns of a CSV line.
        //!
        //! Empty text is a null. Text that does not parse as the column type
        //! is kept as a raw string, logged in
        //! [`Row::deserializing_error_log`] and the row is no longer well
        //! typed. A parsed main index column makes the row's key well typed.

        let Some(owner) = self.owner() else {
            return;
        };
        let schema = owner.schema();
        let mut state = lock(&self.state);

        state.values.clear();
        state.error_log.clear();
        state.well_typed_key = false;
        state.well_typed_data = true;
        state.populated = true;

        for col in 0..schema.column_count() {
            let content = match contents.get(col) {
                Some(content) if !content.is_empty() => content,
                _ => {
                    state.values.push(None);
                    continue;
                }
            };

            let type_code = schema.type_of_col(col);
            match Value::parse(content, type_code) {
                Ok(value) => {
                    state.values.push(value);
                    if schema.main_index_col() == Some(col) {
                        state.well_typed_key = true;
                    }
                }
                Err(_) => {
                    let raw = if type_code == TypeCode::String {
                        content.as_str()
                    } else {
                        content.trim()
                    };
                    let message = format!(
                        "Invalid value at column {} [\"{}\"]; type: {}, raw string: \"{}\"",
                        col,
                        schema.field_name_of_col(col).unwrap_or_default(),
                        type_code,
                        raw
                    );
                    state.error_log.push(message);
                    state.well_typed_data = false;
                    state.values.push(Some(Value::String(raw.to_string())));
                }
            }
        }
    }

    pub fn serialize_to_strings(&self) -> Vec<String> {
        //! The text columns of this row for a CSV line.
        //!
        //! Nulls are empty, booleans are `1` or `0`.

        lock(&self.state)
            .values
            .iter()
            .map(|value| match value {
                None => String::new(),
                Some(Value::Boolean(flag)) => if *flag { "1" } else { "0" }.to_string(),
                Some(value) => value.to_string(),
            })
            .collect()
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let row: Vec<String> = self
            .values()
            .iter()
            .map(|value| match value {
                Some(value) => value.to_string(),
                None => "NIL".to_string(),
            })
            .collect();
        write!(f, "{}", row.join(" | "))
    }
}

impl Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("Row")
            .field("row_index", &state.row_index)
            .field("values", &state.values)
            .field("modify_flags", &state.modify_flags)
            .finish()
    }
}
