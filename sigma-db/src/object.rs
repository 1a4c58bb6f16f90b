// Copyright (c) 2024 SIGMA ENGINE

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// A row type stored in a [`crate::Table`]
pub trait Object: Clone + fmt::Debug + Send + Sync + 'static {
    /// table name, used in errors and logs
    const TABLE: &'static str;

    /// Names of the unique secondary indexes of the table
    const INDEXES: &'static [&'static str] = &[];

    /// Keys of the row in each index, in the order of `INDEXES`
    fn index_keys(&self) -> Vec<Vec<u8>> {
        Vec::new()
    }
}

/// Typed identifier of a row.
///
/// Ids are assigned in increasing order and never reused.
pub struct ObjectId<T> {
    id: u64,
    marker: PhantomData<fn() -> T>,
}

impl<T> ObjectId<T> {
    /// Wraps a raw id
    pub const fn new(id: u64) -> Self {
        ObjectId {
            id,
            marker: PhantomData,
        }
    }

    /// Raw id
    pub const fn to_raw(&self) -> u64 {
        self.id
    }
}

impl<T> Clone for ObjectId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectId<T> {}

impl<T> PartialEq for ObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for ObjectId<T> {}

impl<T> PartialOrd for ObjectId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ObjectId<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> Hash for ObjectId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl<T> fmt::Debug for ObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.id)
    }
}

impl<T> fmt::Display for ObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}
