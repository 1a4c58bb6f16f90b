// Copyright (c) 2024 SIGMA ENGINE

use displaydoc::Display;
use thiserror::Error;

/// Result alias for store operations
pub type DatabaseResult<T, E = DatabaseError> = core::result::Result<T, E>;

/// Errors raised by the state store
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    /// unknown object {id} in table {table}
    UnknownObject {
        /// table name
        table: &'static str,
        /// missing id
        id: u64,
    },
    /// no row of table {table} matches the key in index {index}
    UnknownKey {
        /// table name
        table: &'static str,
        /// searched index
        index: &'static str,
    },
    /// unique index {index} of table {table} already contains this key
    UniqueConstraint {
        /// table name
        table: &'static str,
        /// violated index
        index: &'static str,
    },
    /// table {table} has no index named {index}
    UnknownIndex {
        /// table name
        table: &'static str,
        /// requested index
        index: &'static str,
    },
    /// no undo revision is open
    NoUndoRevision,
    /// the revision cannot be changed while undo history exists
    RevisionLocked,
}
