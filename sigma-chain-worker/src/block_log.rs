// Copyright (c) 2024 SIGMA ENGINE

use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::SignedBlock;

/// Append-only log of the irreversible blocks, indexed by height
#[derive(Debug, Default)]
pub struct BlockLog {
    blocks: Vec<SignedBlock>,
}

impl BlockLog {
    /// Appends the block following the last logged one
    pub fn append(&mut self, block: SignedBlock) -> ChainResult<()> {
        let expected = self.head_num() + 1;
        if block.block_num() != expected {
            return Err(ChainError::InvalidBlock(format!(
                "block {} appended to the log, {} expected",
                block.block_num(),
                expected
            )));
        }
        self.blocks.push(block);
        Ok(())
    }

    /// Height of the last logged block, 0 when empty
    pub fn head_num(&self) -> u32 {
        self.blocks.len() as u32
    }

    /// Logged block at height `num`
    pub fn read_block_by_num(&self, num: u32) -> Option<&SignedBlock> {
        num.checked_sub(1)
            .and_then(|index| self.blocks.get(index as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sigma_hash::Hash;
    use sigma_models::{AccountName, BlockHeader, BlockId, SignedBlockHeader};
    use sigma_time::SigmaTime;

    fn block(num: u32) -> SignedBlock {
        SignedBlock {
            header: SignedBlockHeader::unsigned(BlockHeader {
                previous: BlockId::from_hash_and_num(Hash::zero(), num - 1),
                timestamp: SigmaTime::from_secs(num * 3),
                bobserver: AccountName::new("alice"),
                transaction_merkle_root: Hash::zero(),
                extensions: Vec::new(),
            }),
            transactions: Vec::new(),
        }
    }

    #[test]
    fn test_log_is_contiguous() {
        let mut log = BlockLog::default();
        assert!(log.read_block_by_num(0).is_none());
        log.append(block(1)).unwrap();
        log.append(block(2)).unwrap();
        assert_matches!(log.append(block(4)), Err(ChainError::InvalidBlock(_)));
        assert_eq!(log.head_num(), 2);
        assert_eq!(log.read_block_by_num(2).unwrap().block_num(), 2);
        assert!(log.read_block_by_num(3).is_none());
    }
}
