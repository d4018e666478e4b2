use std::fmt::Display;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

use super::table::Table;
use crate::error::{Result, TableError};
use crate::json::JsonProjector;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATETIME_FORMAT_ISO: &str = "%Y-%m-%dT%H:%M:%S";

/// The closed set of value kinds a column or a cell can carry.
///
/// Everything below [`TypeCode::Table`] is a scalar; [`TypeCode::Table`] and
/// [`TypeCode::ByteArray`] are the two composite kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Empty,
    Boolean,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    DateTime,
    String,
    Table,
    ByteArray,
}

impl TypeCode {
    pub fn from_token(token: &str) -> TypeCode {
        //! Read a type token from the first line of a CSV table.
        //!
        //! Unknown tokens give [`TypeCode::Empty`], the column is then
        //! loaded as all nulls.

        match token.trim().to_uppercase().as_str() {
            "BOOL" => TypeCode::Boolean,
            "BYTE" => TypeCode::SByte,
            "UBYTE" => TypeCode::Byte,
            "SHORT" => TypeCode::Int16,
            "USHORT" => TypeCode::UInt16,
            "INT" => TypeCode::Int32,
            "UINT" => TypeCode::UInt32,
            "LONG" => TypeCode::Int64,
            "ULONG" => TypeCode::UInt64,
            "FLOAT" => TypeCode::Single,
            "DOUBLE" => TypeCode::Double,
            "DATETIME" => TypeCode::DateTime,
            "STRING" => TypeCode::String,
            "VTABLE" => TypeCode::Table,
            "BYTES" => TypeCode::ByteArray,
            _ => TypeCode::Empty,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            TypeCode::Empty => "EMPTY",
            TypeCode::Boolean => "BOOL",
            TypeCode::SByte => "BYTE",
            TypeCode::Byte => "UBYTE",
            TypeCode::Int16 => "SHORT",
            TypeCode::UInt16 => "USHORT",
            TypeCode::Int32 => "INT",
            TypeCode::UInt32 => "UINT",
            TypeCode::Int64 => "LONG",
            TypeCode::UInt64 => "ULONG",
            TypeCode::Single => "FLOAT",
            TypeCode::Double => "DOUBLE",
            TypeCode::DateTime => "DATETIME",
            TypeCode::String => "STRING",
            TypeCode::Table => "VTABLE",
            TypeCode::ByteArray => "BYTES",
        }
    }

    pub fn is_object_type(&self) -> bool {
        matches!(self, TypeCode::Table | TypeCode::ByteArray)
    }

    pub fn can_be_main_index(&self) -> bool {
        matches!(self, TypeCode::String | TypeCode::Int32 | TypeCode::Int16)
    }
}

impl Display for TypeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

impl Serialize for TypeCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        //! Serialized as its CSV type token.

        serializer.serialize_str(self.token())
    }
}

/// A single non-null value stored in a row.
///
/// Nested tables are shared, cloning a [`Value::Table`] clones the handle
/// and not the rows.
#[derive(Clone, Debug)]
pub enum Value {
    Boolean(bool),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    DateTime(NaiveDateTime),
    String(String),
    Table(Arc<Table>),
    ByteArray(Vec<u8>),
}

impl Value {
    pub fn type_code(&self) -> TypeCode {
        match self {
            Value::Boolean(_) => TypeCode::Boolean,
            Value::SByte(_) => TypeCode::SByte,
            Value::Byte(_) => TypeCode::Byte,
            Value::Int16(_) => TypeCode::Int16,
            Value::UInt16(_) => TypeCode::UInt16,
            Value::Int32(_) => TypeCode::Int32,
            Value::UInt32(_) => TypeCode::UInt32,
            Value::Int64(_) => TypeCode::Int64,
            Value::UInt64(_) => TypeCode::UInt64,
            Value::Single(_) => TypeCode::Single,
            Value::Double(_) => TypeCode::Double,
            Value::DateTime(_) => TypeCode::DateTime,
            Value::String(_) => TypeCode::String,
            Value::Table(_) => TypeCode::Table,
            Value::ByteArray(_) => TypeCode::ByteArray,
        }
    }

    pub fn parse(text: &str, type_code: TypeCode) -> Result<Option<Value>> {
        //! Parse the textual form of a value of kind `type_code`.
        //!
        //! String columns keep the text untouched. Every other kind is
        //! trimmed first and blank text is a null. Kinds without a textual
        //! form (nested tables, [`TypeCode::Empty`]) always give a null.

        if type_code == TypeCode::String {
            return Ok(Some(Value::String(text.to_string())));
        }

        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let failed = || TableError::CellConversion {
            from: TypeCode::String,
            to: type_code,
        };

        let value = match type_code {
            TypeCode::Double => Value::Double(text.parse().map_err(|_| failed())?),
            TypeCode::Single => Value::Single(text.parse().map_err(|_| failed())?),
            TypeCode::Int64 => Value::Int64(text.parse().map_err(|_| failed())?),
            TypeCode::UInt64 => Value::UInt64(text.parse().map_err(|_| failed())?),
            TypeCode::Int32 => Value::Int32(text.parse().map_err(|_| failed())?),
            TypeCode::UInt32 => Value::UInt32(text.parse().map_err(|_| failed())?),
            TypeCode::Int16 => Value::Int16(text.parse().map_err(|_| failed())?),
            TypeCode::UInt16 => Value::UInt16(text.parse().map_err(|_| failed())?),
            TypeCode::SByte => Value::SByte(text.parse().map_err(|_| failed())?),
            TypeCode::Byte => Value::Byte(text.parse().map_err(|_| failed())?),
            TypeCode::Boolean => Value::Boolean(parse_bool(text).ok_or_else(failed)?),
            TypeCode::DateTime => Value::DateTime(
                NaiveDateTime::parse_from_str(text, DATETIME_FORMAT)
                    .or_else(|_| NaiveDateTime::parse_from_str(text, DATETIME_FORMAT_ISO))
                    .map_err(|_| failed())?,
            ),
            TypeCode::ByteArray => Value::ByteArray(hex::decode(text).map_err(|_| failed())?),
            TypeCode::Table | TypeCode::Empty | TypeCode::String => return Ok(None),
        };

        Ok(Some(value))
    }

    pub fn convert_to(&self, target: TypeCode) -> Option<Value> {
        //! Convert this value to another kind without losing information.
        //!
        //! Integers convert between widths when in range, floats convert to
        //! integers only when integral, anything converts to a string and
        //! strings are parsed. Returns [`None`] when the conversion is not
        //! possible.

        if self.type_code() == target {
            return Some(self.clone());
        }

        match (self, target) {
            (_, TypeCode::String) => Some(Value::String(self.to_string())),
            (Value::String(text), _) => Value::parse(text, target).ok().flatten(),
            (Value::Single(v), TypeCode::Double) => Some(Value::Double(*v as f64)),
            (Value::Double(v), TypeCode::Single) => {
                let narrowed = *v as f32;
                (narrowed as f64 == *v || v.is_nan()).then_some(Value::Single(narrowed))
            }
            (Value::Single(_) | Value::Double(_), _) => {
                let float = self.as_f64()?;
                if float.fract() != 0.0 || !float.is_finite() {
                    return None;
                }
                integer_to(float as i128, target)
            }
            _ => {
                let integer = self.as_i128()?;
                match target {
                    TypeCode::Single => Some(Value::Single(integer as f32)),
                    TypeCode::Double => Some(Value::Double(integer as f64)),
                    TypeCode::Boolean => Some(Value::Boolean(integer != 0)),
                    _ => integer_to(integer, target),
                }
            }
        }
    }

    pub(crate) fn as_i128(&self) -> Option<i128> {
        match self {
            Value::Boolean(v) => Some(*v as i128),
            Value::SByte(v) => Some(*v as i128),
            Value::Byte(v) => Some(*v as i128),
            Value::Int16(v) => Some(*v as i128),
            Value::UInt16(v) => Some(*v as i128),
            Value::Int32(v) => Some(*v as i128),
            Value::UInt32(v) => Some(*v as i128),
            Value::Int64(v) => Some(*v as i128),
            Value::UInt64(v) => Some(*v as i128),
            _ => None,
        }
    }

    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Single(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }
}

fn integer_to(value: i128, target: TypeCode) -> Option<Value> {
    let value = match target {
        TypeCode::SByte => Value::SByte(i8::try_from(value).ok()?),
        TypeCode::Byte => Value::Byte(u8::try_from(value).ok()?),
        TypeCode::Int16 => Value::Int16(i16::try_from(value).ok()?),
        TypeCode::UInt16 => Value::UInt16(u16::try_from(value).ok()?),
        TypeCode::Int32 => Value::Int32(i32::try_from(value).ok()?),
        TypeCode::UInt32 => Value::UInt32(u32::try_from(value).ok()?),
        TypeCode::Int64 => Value::Int64(i64::try_from(value).ok()?),
        TypeCode::UInt64 => Value::UInt64(u64::try_from(value).ok()?),
        TypeCode::Boolean => Value::Boolean(value != 0),
        _ => return None,
    };
    Some(value)
}

fn parse_bool(text: &str) -> Option<bool> {
    // integers first, "0" is false and anything else is true
    if let Ok(number) = text.parse::<i64>() {
        return Some(number != 0);
    }

    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::SByte(a), Value::SByte(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Int16(a), Value::Int16(b)) => a == b,
            (Value::UInt16(a), Value::UInt16(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::UInt32(a), Value::UInt32(b)) => a == b,
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::UInt64(a), Value::UInt64(b)) => a == b,
            (Value::Single(a), Value::Single(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Table(a), Value::Table(b)) => Arc::ptr_eq(a, b),
            (Value::ByteArray(a), Value::ByteArray(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(v) => write!(f, "{}", v),
            Value::SByte(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Single(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v.format(DATETIME_FORMAT)),
            Value::String(v) => write!(f, "{}", v),
            Value::Table(table) => write!(f, "{}", JsonProjector::for_table(table).to_json()),
            Value::ByteArray(bytes) => write!(f, "{}", hex::encode(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_read_case_insensitive() {
        assert_eq!(TypeCode::from_token("int"), TypeCode::Int32);
        assert_eq!(TypeCode::from_token(" Double "), TypeCode::Double);
        assert_eq!(TypeCode::from_token("byte"), TypeCode::SByte);
        assert_eq!(TypeCode::from_token("decimal"), TypeCode::Empty);
    }

    #[test]
    fn bool_parses_integers_then_literals() {
        assert_eq!(
            Value::parse("2", TypeCode::Boolean).unwrap(),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            Value::parse("0", TypeCode::Boolean).unwrap(),
            Some(Value::Boolean(false))
        );
        assert_eq!(
            Value::parse("TRUE", TypeCode::Boolean).unwrap(),
            Some(Value::Boolean(true))
        );
        assert!(Value::parse("yes", TypeCode::Boolean).is_err());
    }

    #[test]
    fn non_string_text_is_trimmed() {
        assert_eq!(
            Value::parse("  42 ", TypeCode::Int32).unwrap(),
            Some(Value::Int32(42))
        );
        assert_eq!(Value::parse("   ", TypeCode::Int32).unwrap(), None);
        assert_eq!(
            Value::parse("  42 ", TypeCode::String).unwrap(),
            Some(Value::String("  42 ".to_string()))
        );
    }

    #[test]
    fn integer_conversion_checks_range() {
        assert_eq!(
            Value::Int64(300).convert_to(TypeCode::Int16),
            Some(Value::Int16(300))
        );
        assert_eq!(Value::Int64(300).convert_to(TypeCode::SByte), None);
        assert_eq!(Value::Double(2.5).convert_to(TypeCode::Int32), None);
        assert_eq!(
            Value::Double(2.0).convert_to(TypeCode::Int32),
            Some(Value::Int32(2))
        );
        assert_eq!(
            Value::String("17".to_string()).convert_to(TypeCode::Int32),
            Some(Value::Int32(17))
        );
    }

    #[test]
    fn doubles_print_without_trailing_zero() {
        assert_eq!(Value::Double(-1.0).to_string(), "-1");
        assert_eq!(Value::Double(3.5).to_string(), "3.5");
        assert_eq!(Value::Double(0.0).to_string(), "0");
    }
}
