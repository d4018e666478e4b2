//! JSON views of tables and rows.
//!
//! [`JsonProjector::to_json`] renders text directly:
//! - a row is an object of its fields,
//! - a table is `{"<name>": ...}` holding `null` without data rows, the
//!   single row object for one data row, or an array of row objects.
//!
//! [`JsonProjector::to_json_value`] builds the same data as a
//! [`serde_json::Value`], with tables as plain arrays of row objects.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use serde_json::{Map, Number};

use crate::persistence::{Row, Schema, Table, Value};

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which fields make it into the output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FieldFilter {
    #[default]
    All,
    Only(HashSet<String>),
    Exclude(HashSet<String>),
}

impl FieldFilter {
    fn allows(&self, field: &str) -> bool {
        match self {
            FieldFilter::All => true,
            FieldFilter::Only(fields) => fields.contains(field),
            FieldFilter::Exclude(fields) => !fields.contains(field),
        }
    }
}

#[derive(Clone, Copy)]
enum Target<'a> {
    Table(&'a Table),
    Row(&'a Row),
}

/// Projects a [`Table`] or a single [`Row`] to JSON.
///
/// Dummy rows and rows that never got a value are skipped. Nested tables
/// are projected with the same field filter.
#[derive(Clone)]
pub struct JsonProjector<'a> {
    target: Target<'a>,
    filter: FieldFilter,
    keep_main_index: bool,
    // fields excluded since the last allow-list was set
    excluded_since_only: HashSet<String>,
}

impl<'a> JsonProjector<'a> {
    pub fn for_table(table: &'a Table) -> JsonProjector<'a> {
        JsonProjector {
            target: Target::Table(table),
            filter: FieldFilter::All,
            keep_main_index: false,
            excluded_since_only: HashSet::new(),
        }
    }

    pub fn for_row(row: &'a Row) -> JsonProjector<'a> {
        JsonProjector {
            target: Target::Row(row),
            filter: FieldFilter::All,
            keep_main_index: false,
            excluded_since_only: HashSet::new(),
        }
    }

    pub fn only_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        //! Emit only these fields, replacing any earlier selection.

        self.filter = FieldFilter::Only(fields.into_iter().map(Into::into).collect());
        self.excluded_since_only.clear();
        self
    }

    pub fn exclude_field(mut self, field: &str) -> Self {
        //! Leave `field` out. With an allow-list, the field is dropped from
        //! it instead. Once the allow-list is empty, every field excluded
        //! since it was set (its own fields included) is left out and the
        //! rest is emitted.

        match &mut self.filter {
            FieldFilter::All => {
                self.filter = FieldFilter::Exclude(HashSet::from([field.to_string()]));
            }
            FieldFilter::Only(fields) => {
                fields.remove(field);
                self.excluded_since_only.insert(field.to_string());
                if fields.is_empty() {
                    self.filter =
                        FieldFilter::Exclude(std::mem::take(&mut self.excluded_since_only));
                }
            }
            FieldFilter::Exclude(fields) => {
                fields.insert(field.to_string());
            }
        }
        self
    }

    pub fn with_filter(mut self, filter: FieldFilter) -> Self {
        self.filter = filter;
        self.excluded_since_only.clear();
        self
    }

    pub fn keep_main_index(mut self, keep: bool) -> Self {
        //! Always emit the main index column, whatever the filter says.

        self.keep_main_index = keep;
        self
    }

    pub fn filter(&self) -> &FieldFilter {
        &self.filter
    }

    fn selected_columns(&self, schema: &Schema) -> Vec<(usize, String)> {
        schema
            .columns()
            .iter()
            .enumerate()
            .filter(|(col, (field, _))| {
                (self.keep_main_index && schema.main_index_col() == Some(*col))
                    || self.filter.allows(field)
            })
            .map(|(col, (field, _))| (col, field.clone()))
            .collect()
    }

    pub fn to_json(&self) -> String {
        match self.target {
            Target::Row(row) => self.row_to_json(row),
            Target::Table(table) => self.table_to_json(table),
        }
    }

    fn row_to_json(&self, row: &Row) -> String {
        let Some(columns) = row.with_schema(|schema| self.selected_columns(schema)) else {
            return "{}".to_string();
        };
        self.row_columns_to_json(row, &columns)
    }

    fn row_columns_to_json(&self, row: &Row, columns: &[(usize, String)]) -> String {
        let fields: Vec<String> = columns
            .iter()
            .map(|(col, field)| {
                format!(
                    "\"{}\":{}",
                    escape(field),
                    self.value_to_json(row.get(*col).as_ref())
                )
            })
            .collect();
        format!("{{{}}}", fields.join(","))
    }

    fn table_to_json(&self, table: &Table) -> String {
        let columns = self.selected_columns(&table.schema());
        let rows: Vec<String> = exported_rows(table)
            .map(|row| self.row_columns_to_json(row, &columns))
            .collect();

        let body = match rows.len() {
            0 => "null".to_string(),
            1 => rows.join(""),
            _ => format!("[{}]", rows.join(",")),
        };
        format!("{{\"{}\":{}}}", escape(&table.name()), body)
    }

    fn value_to_json(&self, value: Option<&Value>) -> String {
        match value {
            Some(Value::Table(table)) => JsonProjector {
                target: Target::Table(table),
                filter: self.filter.clone(),
                keep_main_index: self.keep_main_index,
                excluded_since_only: HashSet::new(),
            }
            .to_json(),
            other => value_to_json(other),
        }
    }

    pub fn to_json_value(&self) -> serde_json::Value {
        match self.target {
            Target::Row(row) => row
                .with_schema(|schema| self.selected_columns(schema))
                .map(|columns| self.row_to_value(row, &columns))
                .unwrap_or_else(|| serde_json::Value::Object(Map::new())),
            Target::Table(table) => self.table_to_value(table),
        }
    }

    fn row_to_value(&self, row: &Row, columns: &[(usize, String)]) -> serde_json::Value {
        let mut object = Map::new();
        for (col, field) in columns {
            object
                .entry(field.clone())
                .or_insert_with(|| self.to_value(row.get(*col)));
        }
        serde_json::Value::Object(object)
    }

    fn table_to_value(&self, table: &Table) -> serde_json::Value {
        let columns = self.selected_columns(&table.schema());
        serde_json::Value::Array(
            exported_rows(table)
                .map(|row| self.row_to_value(row, &columns))
                .collect(),
        )
    }

    fn to_value(&self, value: Option<Value>) -> serde_json::Value {
        use serde_json::Value as Json;

        let Some(value) = value else {
            return Json::Null;
        };
        match value {
            Value::Boolean(v) => Json::Bool(v),
            Value::SByte(v) => Json::from(v),
            Value::Byte(v) => Json::from(v),
            Value::Int16(v) => Json::from(v),
            Value::UInt16(v) => Json::from(v),
            Value::Int32(v) => Json::from(v),
            Value::UInt32(v) => Json::from(v),
            Value::Int64(v) => Json::from(v),
            Value::UInt64(v) => Json::from(v),
            Value::Single(v) => float_value(v as f64),
            Value::Double(v) => float_value(v),
            Value::DateTime(v) => Json::String(format_datetime(&v)),
            Value::String(v) => Json::String(v),
            Value::ByteArray(bytes) => Json::Array(bytes.into_iter().map(Json::from).collect()),
            Value::Table(table) => JsonProjector {
                target: Target::Table(&table),
                filter: self.filter.clone(),
                keep_main_index: self.keep_main_index,
                excluded_since_only: HashSet::new(),
            }
            .to_json_value(),
        }
    }
}

fn exported_rows(table: &Table) -> impl Iterator<Item = &Row> {
    table
        .all_rows()
        .iter()
        .filter(|row| !row.is_dummy_row() && !row.is_empty_row())
        .map(|row| row.as_ref())
}

fn float_value(value: f64) -> serde_json::Value {
    Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

pub fn escape(text: &str) -> String {
    //! Escape `text` for a JSON string literal, solidus included.

    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '/' => escaped.push_str("\\/"),
            '"' => escaped.push_str("\\\""),
            '\t' => escaped.push_str("\\t"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            ch if (ch as u32) < 0x20 => escaped.push_str(&format!("\\u{:04x}", ch as u32)),
            ch => escaped.push(ch),
        }
    }
    escaped
}

pub(crate) fn value_to_json(value: Option<&Value>) -> String {
    match value {
        None => "null".to_string(),
        Some(Value::String(text)) => format!("\"{}\"", escape(text)),
        Some(Value::DateTime(datetime)) => format!("\"{}\"", format_datetime(datetime)),
        Some(Value::ByteArray(bytes)) => format!("\"{}\"", hex::encode(bytes)),
        Some(Value::Table(table)) => JsonProjector::for_table(table).to_json(),
        Some(other) => other.to_string(),
    }
}
