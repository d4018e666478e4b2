//! In-memory tables are made of the following components
//! - TypeCode and Value (the closed set of kinds a column can hold)
//! - Schema (ordered column names and kinds, order is important)
//! - Row (values of one record plus its dirty state, shared as `Arc<Row>`)
//! - Cell (one value, bound to a row column or detached)
//! - Table (ordered rows, unique main index, dirty set)
//!

use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

//  All modules of this lib
mod cell;
mod index;
mod row;
mod schema;
mod table;
mod types;

//  External API
pub use cell::Cell;
pub use row::{ModifyFlags, Row};
pub use schema::Schema;
pub use table::Table;
pub use types::{TypeCode, Value};

// A panic while holding a row or table lock leaves plain data behind, the
// next user carries on with it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
