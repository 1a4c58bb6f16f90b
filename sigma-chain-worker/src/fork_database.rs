// Copyright (c) 2024 SIGMA ENGINE

//! Recent blocks of every known branch, linked by their parent id.

use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::{BlockId, SignedBlock};
use std::collections::HashMap;
use std::sync::Arc;

/// Block stored in the fork database
#[derive(Debug, Clone)]
pub struct ForkItem {
    /// id of the block
    pub id: BlockId,
    /// the block
    pub block: Arc<SignedBlock>,
}

impl ForkItem {
    /// Height of the block
    pub fn num(&self) -> u32 {
        self.id.num()
    }

    /// Parent id
    pub fn previous(&self) -> BlockId {
        self.block.previous()
    }
}

/// Tree of the reversible blocks
#[derive(Debug, Default)]
pub struct ForkDatabase {
    items: HashMap<BlockId, ForkItem>,
    head: Option<BlockId>,
    max_size: u32,
}

impl ForkDatabase {
    /// Empty database keeping `max_size` heights below the head
    pub fn new(max_size: u32) -> Self {
        ForkDatabase {
            items: HashMap::new(),
            head: None,
            max_size,
        }
    }

    /// Inserts a block and returns the head, which moves to the block when
    /// it is higher than the current head.
    ///
    /// A block whose parent is unknown is rejected unless the database is empty.
    pub fn push_block(&mut self, block: SignedBlock) -> ChainResult<ForkItem> {
        let id = block.id()?;
        if !self.items.is_empty() && !self.items.contains_key(&block.previous()) {
            return Err(ChainError::UnlinkableBlock(format!(
                "parent {:?} of block {:?} is unknown",
                block.previous(),
                id
            )));
        }
        let item = ForkItem {
            id,
            block: Arc::new(block),
        };
        self.items.entry(id).or_insert_with(|| item.clone());
        match self.head() {
            Some(head) if head.num() >= item.num() => {}
            _ => self.head = Some(id),
        }
        self.prune();
        self.head().ok_or_else(|| {
            ChainError::UnlinkableBlock(format!("block {:?} was pruned on insertion", id))
        })
    }

    fn prune(&mut self) {
        let Some(head) = self.head() else {
            return;
        };
        if let Some(min_num) = head.num().checked_sub(self.max_size) {
            self.items.retain(|_, item| item.num() >= min_num);
        }
    }

    /// Head of the longest branch
    pub fn head(&self) -> Option<ForkItem> {
        self.head.and_then(|id| self.items.get(&id).cloned())
    }

    /// Moves the head to a stored block
    pub fn set_head(&mut self, id: BlockId) {
        if self.items.contains_key(&id) {
            self.head = Some(id);
        }
    }

    /// Sets the number of heights kept below the head
    pub fn set_max_size(&mut self, max_size: u32) {
        self.max_size = max_size;
        self.prune();
    }

    /// Whether the block is stored
    pub fn is_known_block(&self, id: &BlockId) -> bool {
        self.items.contains_key(id)
    }

    /// Block by id
    pub fn fetch_block(&self, id: &BlockId) -> Option<ForkItem> {
        self.items.get(id).cloned()
    }

    /// Block at height `num` on the branch of the head
    pub fn fetch_block_on_main_branch_by_number(&self, num: u32) -> Option<ForkItem> {
        let mut item = self.head()?;
        while item.num() > num {
            item = self.items.get(&item.previous())?.clone();
        }
        (item.num() == num).then_some(item)
    }

    /// Removes a block
    pub fn remove(&mut self, id: &BlockId) {
        self.items.remove(id);
    }

    fn get(&self, id: &BlockId) -> ChainResult<ForkItem> {
        self.items
            .get(id)
            .cloned()
            .ok_or_else(|| ChainError::UnlinkableBlock(format!("block {:?} is unknown", id)))
    }

    /// Branches leading from the common ancestor of `first` and `second` to
    /// each of them, highest block first. Both branches end with a child of
    /// the common ancestor.
    pub fn fetch_branch_from(
        &self,
        first: BlockId,
        second: BlockId,
    ) -> ChainResult<(Vec<ForkItem>, Vec<ForkItem>)> {
        let mut first_branch = Vec::new();
        let mut second_branch = Vec::new();
        let mut a = self.get(&first)?;
        let mut b = self.get(&second)?;
        while a.num() > b.num() {
            let previous = a.previous();
            first_branch.push(a);
            a = self.get(&previous)?;
        }
        while b.num() > a.num() {
            let previous = b.previous();
            second_branch.push(b);
            b = self.get(&previous)?;
        }
        while a.previous() != b.previous() {
            let (previous_a, previous_b) = (a.previous(), b.previous());
            first_branch.push(a);
            second_branch.push(b);
            a = self.get(&previous_a)?;
            b = self.get(&previous_b)?;
        }
        first_branch.push(a);
        second_branch.push(b);
        Ok((first_branch, second_branch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sigma_hash::Hash;
    use sigma_models::{AccountName, BlockHeader, SignedBlockHeader};
    use sigma_time::SigmaTime;

    fn block(previous: BlockId, producer: &str) -> SignedBlock {
        SignedBlock {
            header: SignedBlockHeader::unsigned(BlockHeader {
                previous,
                timestamp: SigmaTime::from_secs(previous.num() * 3 + 3),
                bobserver: AccountName::new(producer),
                transaction_merkle_root: Hash::zero(),
                extensions: Vec::new(),
            }),
            transactions: Vec::new(),
        }
    }

    fn push(db: &mut ForkDatabase, previous: BlockId, producer: &str) -> BlockId {
        let block = block(previous, producer);
        let id = block.id().unwrap();
        db.push_block(block).unwrap();
        id
    }

    #[test]
    fn test_longest_branch_wins_and_branches_meet() {
        let mut db = ForkDatabase::new(16);
        let root = push(&mut db, BlockId::zero(), "alice");
        let a2 = push(&mut db, root, "alice");
        let b2 = push(&mut db, root, "bob");
        assert_eq!(db.head().unwrap().id, a2);
        let b3 = push(&mut db, b2, "bob");
        assert_eq!(db.head().unwrap().id, b3);

        let (new_branch, old_branch) = db.fetch_branch_from(b3, a2).unwrap();
        let new_ids: Vec<BlockId> = new_branch.iter().map(|item| item.id).collect();
        let old_ids: Vec<BlockId> = old_branch.iter().map(|item| item.id).collect();
        assert_eq!(new_ids, vec![b3, b2]);
        assert_eq!(old_ids, vec![a2]);
        assert_eq!(new_branch.last().unwrap().previous(), root);
        assert_eq!(db.fetch_block_on_main_branch_by_number(2).unwrap().id, b2);
        assert!(db.is_known_block(&a2));
    }

    #[test]
    fn test_unlinkable_block_is_rejected() {
        let mut db = ForkDatabase::new(16);
        push(&mut db, BlockId::zero(), "alice");
        let orphan = block(BlockId::from_hash_and_num(Hash::compute_from(b"x"), 7), "bob");
        assert_matches!(db.push_block(orphan), Err(ChainError::UnlinkableBlock(_)));
    }

    #[test]
    fn test_old_heights_are_pruned() {
        let mut db = ForkDatabase::new(2);
        let first = push(&mut db, BlockId::zero(), "alice");
        let mut previous = first;
        for _ in 0..4 {
            previous = push(&mut db, previous, "alice");
        }
        assert!(!db.is_known_block(&first));
        assert!(db.is_known_block(&previous));
        assert_eq!(db.head().unwrap().num(), 5);
    }
}
