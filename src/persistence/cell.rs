use std::fmt::Display;
use std::sync::Arc;

use chrono::NaiveDateTime;

use super::row::Row;
use super::table::Table;
use super::types::{TypeCode, Value};
use crate::error::{Result, TableError};

/// A typed value, either bound to a column of a [`Row`] or detached.
///
/// A bound cell holds no copy of its value: every read goes back to the row,
/// so it never goes stale, and every write goes through [`Row::set`]. A
/// detached cell is a plain literal with a [`TypeCode`], typically built with
/// one of the `From` conversions and handed to [`Row::set_cell`] or
/// [`Row::set_field`].
#[derive(Clone, Debug)]
pub struct Cell {
    binding: Option<(Arc<Row>, usize)>,
    value: Option<Value>,
    type_code: TypeCode,
}

macro_rules! scalar_accessor {
    ($name:ident, $ty:ty, $type_code:expr, $variant:ident) => {
        pub fn $name(&self) -> Result<$ty> {
            //! Nulls read as zero.

            let Some(value) = self.data_obj() else {
                return Ok(<$ty>::default());
            };
            match value.convert_to($type_code) {
                Some(Value::$variant(converted)) => Ok(converted),
                _ => Err(TableError::CellConversion {
                    from: value.type_code(),
                    to: $type_code,
                }),
            }
        }
    };
}

impl Cell {
    pub fn null() -> Cell {
        Cell {
            binding: None,
            value: None,
            type_code: TypeCode::Empty,
        }
    }

    pub fn new(value: Option<Value>, type_code: TypeCode) -> Cell {
        Cell {
            binding: None,
            value,
            type_code,
        }
    }

    pub(crate) fn bound(row: Arc<Row>, col: usize, type_code: TypeCode) -> Cell {
        Cell {
            binding: Some((row, col)),
            value: None,
            type_code,
        }
    }

    pub fn data_obj(&self) -> Option<Value> {
        match &self.binding {
            Some((row, col)) => row.get(*col),
            None => self.value.clone(),
        }
    }

    pub fn set_data_obj(&mut self, value: Option<Value>) -> bool {
        //! Write through to the row for a bound cell, or replace the literal
        //! of a detached one.
        //!
        //! Returns `false` when the row refused the value.

        match &self.binding {
            Some((row, col)) => row.set(*col, value),
            None => {
                self.value = value;
                true
            }
        }
    }

    pub fn type_code(&self) -> TypeCode {
        self.type_code
    }

    pub fn set_type_code(&mut self, type_code: TypeCode) {
        //! Bound cells take their type from the schema and ignore this.

        if self.binding.is_none() {
            self.type_code = type_code;
        }
    }

    pub fn row(&self) -> Option<&Arc<Row>> {
        self.binding.as_ref().map(|(row, _)| row)
    }

    pub fn col_index(&self) -> Option<usize> {
        self.binding.as_ref().map(|(_, col)| *col)
    }

    pub fn field_name(&self) -> Option<String> {
        let (row, col) = self.binding.as_ref()?;
        row.field_name_of_col(*col)
    }

    pub fn is_null(&self) -> bool {
        self.data_obj().is_none()
    }

    pub fn is_object_type(&self) -> bool {
        self.type_code.is_object_type()
    }

    scalar_accessor!(as_bool, bool, TypeCode::Boolean, Boolean);
    scalar_accessor!(as_i8, i8, TypeCode::SByte, SByte);
    scalar_accessor!(as_u8, u8, TypeCode::Byte, Byte);
    scalar_accessor!(as_i16, i16, TypeCode::Int16, Int16);
    scalar_accessor!(as_u16, u16, TypeCode::UInt16, UInt16);
    scalar_accessor!(as_i32, i32, TypeCode::Int32, Int32);
    scalar_accessor!(as_u32, u32, TypeCode::UInt32, UInt32);
    scalar_accessor!(as_i64, i64, TypeCode::Int64, Int64);
    scalar_accessor!(as_u64, u64, TypeCode::UInt64, UInt64);
    scalar_accessor!(as_f32, f32, TypeCode::Single, Single);
    scalar_accessor!(as_f64, f64, TypeCode::Double, Double);

    pub fn as_string(&self) -> Option<String> {
        //! The textual form of the value, [`None`] for nulls.

        self.data_obj().map(|value| match value {
            Value::String(text) => text,
            other => other.to_string(),
        })
    }

    pub fn as_table(&self) -> Result<Option<Arc<Table>>> {
        match self.data_obj() {
            None => Ok(None),
            Some(Value::Table(table)) => Ok(Some(table)),
            Some(other) => Err(TableError::CellConversion {
                from: other.type_code(),
                to: TypeCode::Table,
            }),
        }
    }

    pub fn as_bytes(&self) -> Result<Option<Vec<u8>>> {
        match self.data_obj() {
            None => Ok(None),
            Some(Value::ByteArray(bytes)) => Ok(Some(bytes)),
            Some(other) => Err(TableError::CellConversion {
                from: other.type_code(),
                to: TypeCode::ByteArray,
            }),
        }
    }

    pub fn as_datetime(&self) -> Result<Option<NaiveDateTime>> {
        match self.data_obj() {
            None => Ok(None),
            Some(value) => match value.convert_to(TypeCode::DateTime) {
                Some(Value::DateTime(datetime)) => Ok(Some(datetime)),
                _ => Err(TableError::CellConversion {
                    from: value.type_code(),
                    to: TypeCode::DateTime,
                }),
            },
        }
    }

    pub fn to_json(&self) -> String {
        crate::json::value_to_json(self.data_obj().as_ref())
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.data_obj() {
            Some(value) => write!(f, "{}", value),
            None => Ok(()),
        }
    }
}

impl From<Value> for Cell {
    fn from(value: Value) -> Cell {
        let type_code = value.type_code();
        Cell::new(Some(value), type_code)
    }
}

macro_rules! cell_from {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Cell {
            fn from(value: $ty) -> Cell {
                Cell::from(Value::$variant(value))
            }
        }
    };
}

cell_from!(bool, Boolean);
cell_from!(i8, SByte);
cell_from!(u8, Byte);
cell_from!(i16, Int16);
cell_from!(u16, UInt16);
cell_from!(i32, Int32);
cell_from!(u32, UInt32);
cell_from!(i64, Int64);
cell_from!(u64, UInt64);
cell_from!(f32, Single);
cell_from!(f64, Double);
cell_from!(NaiveDateTime, DateTime);
cell_from!(String, String);
cell_from!(Arc<Table>, Table);
cell_from!(Vec<u8>, ByteArray);

impl From<&str> for Cell {
    fn from(value: &str) -> Cell {
        Cell::from(Value::String(value.to_string()))
    }
}
