// Copyright (c) 2024 SIGMA ENGINE

use crate::error::DatabaseResult;
use std::ops::{Deref, DerefMut};

/// State that can open, merge and revert undo revisions.
///
/// Revisions form a stack. `start_undo` opens one on top, `undo` reverts the
/// top one, `squash` merges it into the one below and `commit` forgets the
/// oldest ones, making them permanent.
pub trait UndoableState {
    /// Opens a revision and returns its number
    fn start_undo(&mut self) -> i64;

    /// Reverts every change of the top revision and closes it
    fn undo(&mut self);

    /// Merges the top revision into the one below it.
    /// Without a revision below, the changes become permanent.
    fn squash(&mut self);

    /// Forgets the undo records of every revision up to `revision` included
    fn commit(&mut self, revision: i64);

    /// Current revision number
    fn revision(&self) -> i64;

    /// Sets the revision number, only allowed without undo history
    fn set_revision(&mut self, revision: i64) -> DatabaseResult<()>;

    /// Number of open revisions
    fn undo_depth(&self) -> usize;

    /// Reverts every open revision
    fn undo_all(&mut self) {
        while self.undo_depth() > 0 {
            self.undo();
        }
    }

    /// Opens a revision guarded by an [`UndoSession`]
    fn start_undo_session(&mut self) -> UndoSession<'_, Self>
    where
        Self: Sized,
    {
        UndoSession::new(self)
    }
}

/// Scoped undo revision.
///
/// Dropping the session without calling `push` or `squash` reverts every
/// change made through it. The session dereferences to the state.
pub struct UndoSession<'a, S: UndoableState> {
    state: &'a mut S,
    active: bool,
    revision: i64,
}

impl<'a, S: UndoableState> UndoSession<'a, S> {
    /// Opens a revision on `state`
    pub fn new(state: &'a mut S) -> Self {
        let revision = state.start_undo();
        UndoSession {
            state,
            active: true,
            revision,
        }
    }

    /// Revision opened by this session
    pub fn revision(&self) -> i64 {
        self.revision
    }

    /// Keeps the changes and their undo record on the stack
    pub fn push(mut self) {
        self.active = false;
    }

    /// Merges the changes into the enclosing revision
    pub fn squash(mut self) {
        if self.active {
            self.state.squash();
            self.active = false;
        }
    }

    /// Reverts the changes now
    pub fn undo(mut self) {
        if self.active {
            self.state.undo();
            self.active = false;
        }
    }
}

impl<S: UndoableState> Deref for UndoSession<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.state
    }
}

impl<S: UndoableState> DerefMut for UndoSession<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.state
    }
}

impl<S: UndoableState> Drop for UndoSession<'_, S> {
    fn drop(&mut self) {
        if self.active {
            self.state.undo();
        }
    }
}

/// Implements [`UndoableState`] for a struct whose listed fields are
/// undoable (tables or nested states). Every field moves in lockstep.
///
/// ```
/// # use sigma_db::{undoable_state, Object, Table, UndoableState};
/// #[derive(Clone, Debug)]
/// struct Row(u32);
/// impl Object for Row {
///     const TABLE: &'static str = "row";
/// }
/// #[derive(Default)]
/// struct State {
///     rows: Table<Row>,
///     others: Table<Row>,
/// }
/// undoable_state!(State { rows, others });
///
/// let mut state = State::default();
/// let mut session = state.start_undo_session();
/// session.rows.create(Row(1)).unwrap();
/// drop(session);
/// assert!(state.rows.is_empty());
/// ```
#[macro_export]
macro_rules! undoable_state {
    ($state:ty { $first:ident $(, $field:ident)* $(,)? }) => {
        impl $crate::UndoableState for $state {
            fn start_undo(&mut self) -> i64 {
                $( $crate::UndoableState::start_undo(&mut self.$field); )*
                $crate::UndoableState::start_undo(&mut self.$first)
            }

            fn undo(&mut self) {
                $crate::UndoableState::undo(&mut self.$first);
                $( $crate::UndoableState::undo(&mut self.$field); )*
            }

            fn squash(&mut self) {
                $crate::UndoableState::squash(&mut self.$first);
                $( $crate::UndoableState::squash(&mut self.$field); )*
            }

            fn commit(&mut self, revision: i64) {
                $crate::UndoableState::commit(&mut self.$first, revision);
                $( $crate::UndoableState::commit(&mut self.$field, revision); )*
            }

            fn revision(&self) -> i64 {
                $crate::UndoableState::revision(&self.$first)
            }

            fn set_revision(&mut self, revision: i64) -> $crate::DatabaseResult<()> {
                $crate::UndoableState::set_revision(&mut self.$first, revision)?;
                $( $crate::UndoableState::set_revision(&mut self.$field, revision)?; )*
                Ok(())
            }

            fn undo_depth(&self) -> usize {
                $crate::UndoableState::undo_depth(&self.$first)
            }
        }
    };
}
