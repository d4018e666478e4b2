use std::collections::HashMap;
use std::fmt::Display;

use super::types::TypeCode;
use crate::error::{Result, TableError};

/// Ordered column definitions of a [`super::Table`].
///
/// Every column has a unique name and a [`TypeCode`]. At most one column is
/// the main index: the unique key of the table, restricted to
/// [`TypeCode::String`], [`TypeCode::Int32`] and [`TypeCode::Int16`].
///
/// # Issues
/// - A main index on any other type is silently dropped instead of being
///   reported, callers have to check [`Schema::main_index_col`] afterwards.
#[derive(Clone, Debug)]
pub struct Schema {
    name: String,
    fields: Vec<(String, TypeCode)>,
    field_to_col: HashMap<String, usize>,
    main_index_col: Option<usize>,
}

impl Schema {
    pub fn new(
        name: &str,
        fields: Vec<(String, TypeCode)>,
        main_index_col: Option<usize>,
    ) -> Result<Schema> {
        //! Create a schema from a vector of column names and their types.
        //!
        //! Two columns with the same name make no schema, that is an error.

        let mut field_to_col = HashMap::with_capacity(fields.len());
        for (index, (field, _)) in fields.iter().enumerate() {
            if field_to_col.insert(field.clone(), index).is_some() {
                return Err(TableError::DuplicateField {
                    field: field.clone(),
                    schema: name.to_string(),
                });
            }
        }

        let mut schema = Schema {
            name: name.to_string(),
            fields,
            field_to_col,
            main_index_col: None,
        };
        schema.set_main_index(main_index_col);

        Ok(schema)
    }

    pub fn empty(name: &str) -> Schema {
        Schema {
            name: name.to_string(),
            fields: Vec::new(),
            field_to_col: HashMap::new(),
            main_index_col: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    pub fn append_field(&mut self, field: &str, type_code: TypeCode) -> Result<usize> {
        self.append_field_at(field, type_code, self.fields.len())
    }

    pub fn append_field_at(
        &mut self,
        field: &str,
        type_code: TypeCode,
        col: usize,
    ) -> Result<usize> {
        //! Place a field at column `col`.
        //!
        //! An existing column at `col` is overwritten. Columns between the
        //! current end and `col` are padded with unnamed [`TypeCode::Empty`]
        //! columns.

        if let Some(&existing) = self.field_to_col.get(field) {
            if existing != col {
                return Err(TableError::DuplicateField {
                    field: field.to_string(),
                    schema: self.name.clone(),
                });
            }
        }

        if col < self.fields.len() {
            let (old_name, _) = &self.fields[col];
            if self.field_to_col.get(old_name) == Some(&col) {
                self.field_to_col.remove(old_name);
            }
            self.fields[col] = (field.to_string(), type_code);
        } else {
            while self.fields.len() < col {
                self.fields.push((String::new(), TypeCode::Empty));
            }
            self.fields.push((field.to_string(), type_code));
        }

        self.field_to_col.insert(field.to_string(), col);

        // an overwritten main index column may no longer be indexable
        if self.main_index_col == Some(col) {
            self.set_main_index(Some(col));
        }

        Ok(col)
    }

    pub fn field_to_col(&self, field: &str) -> Option<usize> {
        self.field_to_col.get(field).copied()
    }

    pub fn type_of_col(&self, col: usize) -> TypeCode {
        //! Returns [`TypeCode::Empty`] for columns out of range.

        self.fields
            .get(col)
            .map(|(_, type_code)| *type_code)
            .unwrap_or(TypeCode::Empty)
    }

    pub fn field_name_of_col(&self, col: usize) -> Option<&str> {
        self.fields.get(col).map(|(name, _)| name.as_str())
    }

    pub fn column(&self, col: usize) -> Option<(&str, TypeCode)> {
        self.fields
            .get(col)
            .map(|(name, type_code)| (name.as_str(), *type_code))
    }

    pub fn columns(&self) -> &[(String, TypeCode)] {
        &self.fields
    }

    pub fn main_index_col(&self) -> Option<usize> {
        self.main_index_col
    }

    pub fn set_main_index(&mut self, col: Option<usize>) {
        //! Select the main index column.
        //!
        //! The selection is cleared instead when the column is out of range
        //! or its type cannot be a key.

        self.main_index_col = col.filter(|&col| self.is_valid_main_index(col));
    }

    pub fn is_valid_main_index(&self, col: usize) -> bool {
        col < self.fields.len() && self.type_of_col(col).can_be_main_index()
    }

    pub fn type_tokens(&self) -> Vec<String> {
        //! The first header line of a CSV table.

        self.fields
            .iter()
            .map(|(_, type_code)| type_code.token().to_string())
            .collect()
    }

    pub fn field_names(&self) -> Vec<String> {
        //! The second header line of a CSV table.

        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let schema: Vec<String> = self
            .fields
            .iter()
            .enumerate()
            .map(|(col, (name, type_code))| {
                if self.main_index_col == Some(col) {
                    format!("{} ({}, key)", name, type_code)
                } else {
                    format!("{} ({})", name, type_code)
                }
            })
            .collect();
        write!(f, "{}", schema.join(" | "))
    }
}
