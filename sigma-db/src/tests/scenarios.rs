// Copyright (c) 2024 SIGMA ENGINE

use crate::*;
use assert_matches::assert_matches;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Account {
    name: String,
    balance: u64,
}

impl Object for Account {
    const TABLE: &'static str = "account";
    const INDEXES: &'static [&'static str] = &["by_name", "by_balance"];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![
            KeyBuilder::new().str(&self.name).build(),
            KeyBuilder::new()
                .u64_desc(self.balance)
                .str(&self.name)
                .build(),
        ]
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Vote {
    account: String,
    target: String,
}

impl Object for Vote {
    const TABLE: &'static str = "vote";
    const INDEXES: &'static [&'static str] = &["by_account_target"];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![KeyBuilder::new()
            .str(&self.account)
            .str(&self.target)
            .build()]
    }
}

#[derive(Default, Clone, Debug, PartialEq)]
struct State {
    accounts: Table<Account>,
    votes: Table<Vote>,
}

undoable_state!(State { accounts, votes });

fn account(name: &str, balance: u64) -> Account {
    Account {
        name: name.to_string(),
        balance,
    }
}

fn name_key(name: &str) -> Vec<u8> {
    KeyBuilder::new().str(name).build()
}

fn seeded() -> State {
    let mut state = State::default();
    state.accounts.create(account("alice", 100)).unwrap();
    state.accounts.create(account("bob", 50)).unwrap();
    state
}

#[test]
fn test_unique_index_rejects_duplicates_without_side_effects() {
    let mut state = seeded();
    let before = state.clone();
    assert_matches!(
        state.accounts.create(account("alice", 1)),
        Err(DatabaseError::UniqueConstraint {
            index: "by_name",
            ..
        })
    );
    let (bob, _) = state.accounts.find_by("by_name", &name_key("bob")).unwrap();
    assert_matches!(
        state
            .accounts
            .modify(bob, |row| row.name = "alice".to_string()),
        Err(DatabaseError::UniqueConstraint { .. })
    );
    assert_eq!(state, before);
    assert_eq!(state.accounts.get(bob).unwrap().name, "bob");
}

#[test]
fn test_index_order_follows_keys() {
    let mut state = seeded();
    state.accounts.create(account("carol", 75)).unwrap();
    let by_balance: Vec<&str> = state
        .accounts
        .iter_by("by_balance")
        .unwrap()
        .map(|(_, row)| row.name.as_str())
        .collect();
    assert_eq!(by_balance, vec!["alice", "carol", "bob"]);

    state
        .votes
        .create(Vote {
            account: "al".to_string(),
            target: "x".to_string(),
        })
        .unwrap();
    state
        .votes
        .create(Vote {
            account: "alice".to_string(),
            target: "y".to_string(),
        })
        .unwrap();
    let prefix = name_key("al");
    let voted: Vec<&str> = state
        .votes
        .range_by("by_account_target", &prefix)
        .unwrap()
        .map(|(_, vote)| vote.target.as_str())
        .collect();
    assert_eq!(voted, vec!["x"]);
    assert_matches!(
        state.votes.iter_by("by_name").map(|it| it.count()),
        Err(DatabaseError::UnknownIndex { .. })
    );
}

#[test]
fn test_dropped_session_restores_identical_state() {
    let mut state = seeded();
    let before = state.clone();
    {
        let mut session = state.start_undo_session();
        let (alice, _) = session.accounts.find_by("by_name", &name_key("alice")).unwrap();
        session.accounts.modify(alice, |row| row.balance = 1).unwrap();
        let (bob, _) = session.accounts.find_by("by_name", &name_key("bob")).unwrap();
        session.accounts.remove(bob).unwrap();
        session.accounts.create(account("bob", 7)).unwrap();
        session
            .votes
            .create(Vote {
                account: "alice".to_string(),
                target: "bob".to_string(),
            })
            .unwrap();
    }
    assert_eq!(state, before);
    assert_eq!(state.undo_depth(), 0);
    // the id counter was rewound
    assert_eq!(state.accounts.next_id().to_raw(), 2);
    assert_eq!(
        state.accounts.find_by("by_balance", &KeyBuilder::new().u64_desc(50).str("bob").build())
            .map(|(_, row)| row.balance),
        Some(50)
    );
}

#[test]
fn test_squash_keeps_changes_undoable_by_parent() {
    let mut state = seeded();
    let before = state.clone();
    let outer = state.start_undo();
    {
        let mut inner = state.start_undo_session();
        let (alice, _) = inner.accounts.find_by("by_name", &name_key("alice")).unwrap();
        inner.accounts.modify(alice, |row| row.balance += 10).unwrap();
        inner.accounts.create(account("carol", 3)).unwrap();
        inner.squash();
    }
    assert_eq!(state.revision(), outer);
    assert_eq!(state.accounts.len(), 3);
    {
        let mut inner = state.start_undo_session();
        let (carol, _) = inner.accounts.find_by("by_name", &name_key("carol")).unwrap();
        inner.accounts.remove(carol).unwrap();
        let (alice, _) = inner.accounts.find_by("by_name", &name_key("alice")).unwrap();
        inner.accounts.remove(alice).unwrap();
        inner.squash();
    }
    assert_eq!(state.accounts.len(), 1);
    state.undo();
    assert_eq!(state, before);
}

#[test]
fn test_pushed_revisions_are_undone_in_order_and_commit_forgets_them() {
    let mut state = seeded();
    let start = state.revision();
    let snapshots: Vec<State> = (0..3)
        .map(|i| {
            let snapshot = state.clone();
            let mut session = state.start_undo_session();
            session.accounts.create(account(&format!("user{}", i), i)).unwrap();
            session.push();
            snapshot
        })
        .collect();
    assert_eq!(state.revision(), start + 3);
    assert_eq!(state.undo_depth(), 3);

    state.undo();
    assert_eq!(state, snapshots[2]);

    state.commit(start + 1);
    assert_eq!(state.undo_depth(), 1);
    state.undo_all();
    assert_eq!(state, snapshots[1]);
    assert_eq!(state.revision(), start + 1);
    assert_eq!(state.set_revision(10), Ok(()));
    state.start_undo();
    assert_matches!(state.set_revision(3), Err(DatabaseError::RevisionLocked));
}

#[test]
fn test_shared_database_serializes_writers() {
    let shared = SharedDatabase::new(seeded());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = shared.clone();
            std::thread::spawn(move || {
                for _ in 0..25 {
                    shared.with_write_lock(|state| {
                        let (alice, _) = state
                            .accounts
                            .find_by("by_name", &name_key("alice"))
                            .unwrap();
                        state.accounts.modify(alice, |row| row.balance += 1).unwrap();
                    });
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    let balance = shared.with_read_lock(|state| {
        state
            .accounts
            .find_by("by_name", &name_key("alice"))
            .map(|(_, row)| row.balance)
    });
    assert_eq!(balance, Some(200));
}
