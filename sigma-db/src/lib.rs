// Copyright (c) 2024 SIGMA ENGINE
//! Versioned in-memory state store.
//!
//! State is a set of typed [`Table`]s. Each table keeps its rows by
//! [`ObjectId`], maintains unique secondary indexes over byte keys and
//! records undo information while an undo revision is open. A struct made of
//! tables becomes an [`UndoableState`] through [`undoable_state!`], which
//! gives it nested [`UndoSession`]s spanning every table at once.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod error;
mod key;
mod object;
mod shared;
mod table;
mod undo;

pub use error::*;
pub use key::*;
pub use object::*;
pub use shared::*;
pub use table::*;
pub use undo::*;

#[cfg(test)]
mod tests;
