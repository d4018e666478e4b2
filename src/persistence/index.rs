use std::collections::HashMap;

use super::types::{TypeCode, Value};

/// The main index of a [`super::Table`]: key value to row position.
///
/// String keys and integer keys live in separate maps, picked from the type
/// of the main index column. Lookups accept either form and convert to the
/// map's key kind.
///
/// # Issues
/// - Entries are never shifted when a row is removed, positions of rows
///   behind the removed one go stale until the index is rebuilt with
///   [`super::Table::set_main_index`].
#[derive(Clone, Debug)]
pub(crate) enum KeyIndex {
    Str(HashMap<String, usize>),
    Int(HashMap<i64, usize>),
}

impl KeyIndex {
    pub fn for_type(type_code: TypeCode) -> KeyIndex {
        if type_code == TypeCode::String {
            KeyIndex::Str(HashMap::new())
        } else {
            KeyIndex::Int(HashMap::new())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            KeyIndex::Str(map) => map.len(),
            KeyIndex::Int(map) => map.len(),
        }
    }

    pub fn clear(&mut self) {
        match self {
            KeyIndex::Str(map) => map.clear(),
            KeyIndex::Int(map) => map.clear(),
        }
    }

    pub fn lookup_str(&self, key: &str) -> Option<usize> {
        //! On an integer index the key is parsed first, text that is no
        //! integer finds nothing.

        match self {
            KeyIndex::Str(map) => map.get(key).copied(),
            KeyIndex::Int(map) => key
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|key| map.get(&key).copied()),
        }
    }

    pub fn lookup_int(&self, key: i64) -> Option<usize> {
        match self {
            KeyIndex::Str(map) => map.get(&key.to_string()).copied(),
            KeyIndex::Int(map) => map.get(&key).copied(),
        }
    }

    pub fn lookup_value(&self, key: &Value) -> Option<usize> {
        match key {
            Value::String(text) => self.lookup_str(text),
            other => self.lookup_int(i64::try_from(other.as_i128()?).ok()?),
        }
    }

    pub fn insert_str(&mut self, key: &str, index: usize) -> bool {
        //! Returns `false` when the key does not fit an integer index.

        match self {
            KeyIndex::Str(map) => {
                map.insert(key.to_string(), index);
                true
            }
            KeyIndex::Int(map) => match key.trim().parse::<i64>() {
                Ok(key) => {
                    map.insert(key, index);
                    true
                }
                Err(_) => false,
            },
        }
    }

    pub fn insert_value(&mut self, key: &Value, index: usize) -> bool {
        match (self, key) {
            (KeyIndex::Str(map), key) => {
                let key = match key {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                map.insert(key, index);
                true
            }
            (KeyIndex::Int(map), Value::String(text)) => match text.trim().parse::<i64>() {
                Ok(key) => {
                    map.insert(key, index);
                    true
                }
                Err(_) => false,
            },
            (KeyIndex::Int(map), other) => {
                let Some(key) = other.as_i128().and_then(|key| i64::try_from(key).ok()) else {
                    return false;
                };
                map.insert(key, index);
                true
            }
        }
    }

    pub fn remove_value(&mut self, key: &Value) -> Option<usize> {
        match (self, key) {
            (KeyIndex::Str(map), Value::String(text)) => map.remove(text),
            (KeyIndex::Str(map), other) => map.remove(&other.to_string()),
            (KeyIndex::Int(map), Value::String(text)) => {
                map.remove(&text.trim().parse::<i64>().ok()?)
            }
            (KeyIndex::Int(map), other) => map.remove(&i64::try_from(other.as_i128()?).ok()?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_index_parses_string_keys() {
        let mut index = KeyIndex::for_type(TypeCode::Int32);
        assert!(index.insert_value(&Value::Int32(7), 0));
        assert_eq!(index.lookup_str("7"), Some(0));
        assert_eq!(index.lookup_str(" 7 "), Some(0));
        assert_eq!(index.lookup_str("seven"), None);
        assert!(!index.insert_str("seven", 1));
    }

    #[test]
    fn string_index_formats_int_keys() {
        let mut index = KeyIndex::for_type(TypeCode::String);
        assert!(index.insert_str("42", 3));
        assert_eq!(index.lookup_int(42), Some(3));
        assert_eq!(index.lookup_value(&Value::Int16(42)), Some(3));
        assert_eq!(index.remove_value(&Value::String("42".to_string())), Some(3));
        assert_eq!(index.len(), 0);
    }
}
