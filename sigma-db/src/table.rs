// Copyright (c) 2024 SIGMA ENGINE

use crate::error::{DatabaseError, DatabaseResult};
use crate::object::{Object, ObjectId};
use crate::undo::UndoableState;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Bound::{Included, Unbounded};

/// Undo record of one revision of a table
#[derive(Debug, Clone)]
struct UndoRecord<T> {
    /// before-images of rows modified during the revision
    old_values: BTreeMap<u64, T>,
    /// rows removed during the revision, as they were before it
    removed_values: BTreeMap<u64, T>,
    /// rows created during the revision
    new_ids: BTreeSet<u64>,
    /// id counter when the revision started
    old_next_id: u64,
    revision: i64,
}

/// A typed table with unique secondary indexes and an undo stack
#[derive(Debug, Clone)]
pub struct Table<T: Object> {
    rows: BTreeMap<u64, T>,
    indexes: Vec<BTreeMap<Vec<u8>, u64>>,
    next_id: u64,
    undo_stack: VecDeque<UndoRecord<T>>,
    revision: i64,
}

impl<T: Object> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Object + PartialEq> PartialEq for Table<T> {
    /// Tables are equal when they hold the same rows under the same ids and
    /// would assign the same next id. Undo history is not compared.
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.next_id == other.next_id
    }
}

impl<T: Object> Table<T> {
    /// Creates an empty table
    pub fn new() -> Self {
        Table {
            rows: BTreeMap::new(),
            indexes: vec![BTreeMap::new(); T::INDEXES.len()],
            next_id: 0,
            undo_stack: VecDeque::new(),
            revision: 0,
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no row
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Id the next created row will get
    pub fn next_id(&self) -> ObjectId<T> {
        ObjectId::new(self.next_id)
    }

    /// Row by id
    pub fn find(&self, id: ObjectId<T>) -> Option<&T> {
        self.rows.get(&id.to_raw())
    }

    /// Row by id, failing when missing
    pub fn get(&self, id: ObjectId<T>) -> DatabaseResult<&T> {
        self.find(id).ok_or(DatabaseError::UnknownObject {
            table: T::TABLE,
            id: id.to_raw(),
        })
    }

    /// Row by exact key in `index`
    pub fn find_by(&self, index: &'static str, key: &[u8]) -> Option<(ObjectId<T>, &T)> {
        let position = self.index_position(index).ok()?;
        let id = *self.indexes[position].get(key)?;
        self.rows.get(&id).map(|row| (ObjectId::new(id), row))
    }

    /// Row by exact key in `index`, failing when missing
    pub fn get_by(&self, index: &'static str, key: &[u8]) -> DatabaseResult<(ObjectId<T>, &T)> {
        self.index_position(index)?;
        self.find_by(index, key).ok_or(DatabaseError::UnknownKey {
            table: T::TABLE,
            index,
        })
    }

    /// All rows in id order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (ObjectId<T>, &T)> + '_ {
        self.rows.iter().map(|(id, row)| (ObjectId::new(*id), row))
    }

    /// All rows in the key order of `index`
    pub fn iter_by(
        &self,
        index: &'static str,
    ) -> DatabaseResult<impl DoubleEndedIterator<Item = (ObjectId<T>, &T)> + '_> {
        let position = self.index_position(index)?;
        Ok(self.indexes[position]
            .values()
            .filter_map(move |id| self.rows.get(id).map(|row| (ObjectId::new(*id), row))))
    }

    /// Rows whose key in `index` starts with `prefix`, in key order
    pub fn range_by<'a>(
        &'a self,
        index: &'static str,
        prefix: &'a [u8],
    ) -> DatabaseResult<impl Iterator<Item = (ObjectId<T>, &'a T)> + 'a> {
        let position = self.index_position(index)?;
        Ok(self.indexes[position]
            .range::<[u8], _>((Included(prefix), Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
            .filter_map(move |(_, id)| self.rows.get(id).map(|row| (ObjectId::new(*id), row))))
    }

    /// Rows whose key in `index` is at least `from`, in key order
    pub fn iter_from<'a>(
        &'a self,
        index: &'static str,
        from: &'a [u8],
    ) -> DatabaseResult<impl Iterator<Item = (ObjectId<T>, &'a T)> + 'a> {
        let position = self.index_position(index)?;
        Ok(self.indexes[position]
            .range::<[u8], _>((Included(from), Unbounded))
            .filter_map(move |(_, id)| self.rows.get(id).map(|row| (ObjectId::new(*id), row))))
    }

    /// Inserts a row under a fresh id.
    ///
    /// Fails without touching the table when a unique key is taken.
    pub fn create(&mut self, value: T) -> DatabaseResult<ObjectId<T>> {
        let keys = value.index_keys();
        self.check_unique(&keys, None)?;
        let id = self.next_id;
        self.next_id += 1;
        self.insert_indexes(id, keys);
        self.rows.insert(id, value);
        if let Some(record) = self.undo_stack.back_mut() {
            record.new_ids.insert(id);
        }
        Ok(ObjectId::new(id))
    }

    /// Applies `mutator` to a row.
    ///
    /// The row is left unchanged when the mutated value would violate a
    /// unique index.
    pub fn modify(&mut self, id: ObjectId<T>, mutator: impl FnOnce(&mut T)) -> DatabaseResult<()> {
        let raw = id.to_raw();
        let current = self.get(id)?;
        let mut updated = current.clone();
        mutator(&mut updated);
        let old_keys = current.index_keys();
        let new_keys = updated.index_keys();
        self.check_unique(&new_keys, Some(raw))?;
        let before = self.rows.insert(raw, updated);
        self.remove_indexes(old_keys);
        self.insert_indexes(raw, new_keys);
        if let (Some(record), Some(before)) = (self.undo_stack.back_mut(), before) {
            if !record.new_ids.contains(&raw) && !record.old_values.contains_key(&raw) {
                record.old_values.insert(raw, before);
            }
        }
        Ok(())
    }

    /// Removes a row and returns it
    pub fn remove(&mut self, id: ObjectId<T>) -> DatabaseResult<T> {
        let raw = id.to_raw();
        let value = self.rows.remove(&raw).ok_or(DatabaseError::UnknownObject {
            table: T::TABLE,
            id: raw,
        })?;
        self.remove_indexes(value.index_keys());
        if let Some(record) = self.undo_stack.back_mut() {
            if record.new_ids.remove(&raw) {
                return Ok(value);
            }
            if let Some(old) = record.old_values.remove(&raw) {
                record.removed_values.insert(raw, old);
                return Ok(value);
            }
            record.removed_values.insert(raw, value.clone());
        }
        Ok(value)
    }

    fn index_position(&self, index: &'static str) -> DatabaseResult<usize> {
        T::INDEXES
            .iter()
            .position(|name| *name == index)
            .ok_or(DatabaseError::UnknownIndex {
                table: T::TABLE,
                index,
            })
    }

    fn check_unique(&self, keys: &[Vec<u8>], owner: Option<u64>) -> DatabaseResult<()> {
        for (position, key) in keys.iter().enumerate() {
            if let Some(existing) = self.indexes[position].get(key) {
                if Some(*existing) != owner {
                    return Err(DatabaseError::UniqueConstraint {
                        table: T::TABLE,
                        index: T::INDEXES[position],
                    });
                }
            }
        }
        Ok(())
    }

    fn insert_indexes(&mut self, id: u64, keys: Vec<Vec<u8>>) {
        for (index, key) in self.indexes.iter_mut().zip(keys) {
            index.insert(key, id);
        }
    }

    fn remove_indexes(&mut self, keys: Vec<Vec<u8>>) {
        for (index, key) in self.indexes.iter_mut().zip(keys) {
            index.remove(&key);
        }
    }

    fn remove_raw(&mut self, id: u64) -> Option<T> {
        let value = self.rows.remove(&id)?;
        self.remove_indexes(value.index_keys());
        Some(value)
    }

    fn insert_raw(&mut self, id: u64, value: T) {
        self.insert_indexes(id, value.index_keys());
        self.rows.insert(id, value);
    }
}

impl<T: Object> UndoableState for Table<T> {
    fn start_undo(&mut self) -> i64 {
        self.revision += 1;
        self.undo_stack.push_back(UndoRecord {
            old_values: BTreeMap::new(),
            removed_values: BTreeMap::new(),
            new_ids: BTreeSet::new(),
            old_next_id: self.next_id,
            revision: self.revision,
        });
        self.revision
    }

    fn undo(&mut self) {
        let Some(record) = self.undo_stack.pop_back() else {
            return;
        };
        // removals first so that restored keys never collide with live ones
        for id in &record.new_ids {
            self.remove_raw(*id);
        }
        for id in record.old_values.keys() {
            self.remove_raw(*id);
        }
        for (id, value) in record.old_values.into_iter().chain(record.removed_values) {
            self.insert_raw(id, value);
        }
        self.next_id = record.old_next_id;
        self.revision -= 1;
    }

    fn squash(&mut self) {
        let Some(record) = self.undo_stack.pop_back() else {
            return;
        };
        self.revision -= 1;
        let Some(previous) = self.undo_stack.back_mut() else {
            return;
        };
        for (id, value) in record.old_values {
            if previous.new_ids.contains(&id) || previous.old_values.contains_key(&id) {
                continue;
            }
            previous.old_values.insert(id, value);
        }
        previous.new_ids.extend(record.new_ids);
        for (id, value) in record.removed_values {
            if previous.new_ids.remove(&id) {
                continue;
            }
            if let Some(old) = previous.old_values.remove(&id) {
                previous.removed_values.insert(id, old);
                continue;
            }
            previous.removed_values.insert(id, value);
        }
    }

    fn commit(&mut self, revision: i64) {
        while self
            .undo_stack
            .front()
            .map_or(false, |record| record.revision <= revision)
        {
            self.undo_stack.pop_front();
        }
    }

    fn revision(&self) -> i64 {
        self.revision
    }

    fn set_revision(&mut self, revision: i64) -> DatabaseResult<()> {
        if !self.undo_stack.is_empty() {
            return Err(DatabaseError::RevisionLocked);
        }
        self.revision = revision;
        Ok(())
    }

    fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }
}
