// Copyright (c) 2024 SIGMA ENGINE

use super::Chain;
use crate::evaluator::OperationPosition;
use sigma_chain_exports::{ChainError, ChainResult, SkipFlags};
use sigma_db::UndoableState;
use sigma_hash::Hash;
use sigma_models::constants::BLOCKCHAIN_VERSION;
use sigma_models::{
    AccountName, BlockHeader, BlockHeaderExtension, HardforkVersion, HardforkVersionVote,
    SignedBlock, SignedBlockHeader,
};
use sigma_signature::PrivateKey;
use sigma_time::SigmaTime;
use tracing::{debug, info, warn};

impl Chain {
    /// Builds, signs and applies the block of `bobserver` for the slot at
    /// `when`, filled with the pending transactions that still apply
    pub fn generate_block(
        &mut self,
        when: SigmaTime,
        bobserver: AccountName,
        signing_key: PrivateKey,
        skip: SkipFlags,
    ) -> ChainResult<SignedBlock> {
        self.producing = true;
        let result = self.generate_block_inner(when, bobserver, signing_key, skip);
        self.producing = false;
        result
    }

    fn generate_block_inner(
        &mut self,
        when: SigmaTime,
        bobserver: AccountName,
        signing_key: PrivateKey,
        skip: SkipFlags,
    ) -> ChainResult<SignedBlock> {
        let slot = self.get_slot_at_time(when)?;
        if slot == 0 {
            return Err(ChainError::InvalidBlock(format!(
                "{} precedes the next slot",
                when
            )));
        }
        let scheduled = self.get_scheduled_bobserver(slot)?;
        if scheduled != bobserver {
            return Err(ChainError::InvalidBlock(format!(
                "slot {} is scheduled for {}, not {}",
                slot, scheduled, bobserver
            )));
        }
        let (_, producer) = self.state.get_bobserver(&bobserver)?;
        if !skip.contains(SkipFlags::BOBSERVER_SIGNATURE)
            && producer.signing_key != signing_key.public_key()
        {
            return Err(ChainError::InvalidBlock(format!(
                "the signing key of {} does not match",
                bobserver
            )));
        }
        let running_version = producer.running_version;
        let vote = (producer.hardfork_version_vote, producer.hardfork_time_vote);

        let block_num = self.state.head_block_num()? + 1;
        let max_block_size = self.state.dynamic_global_properties()?.maximum_block_size;
        let mut block = SignedBlock {
            header: SignedBlockHeader::unsigned(BlockHeader {
                previous: self.state.head_block_id()?,
                timestamp: when,
                bobserver: bobserver.clone(),
                transaction_merkle_root: Hash::zero(),
                extensions: Vec::new(),
            }),
            transactions: Vec::new(),
        };
        let mut block_size = block.serialized_size()? as u64 + 4;

        // apply the pending transactions again, in a fresh pending session
        self.clear_pending();
        self.state.start_undo();
        self.pending_session = true;
        let mut postponed = 0;
        for trx in self.pending_transactions.clone() {
            if trx.transaction.expiration < when {
                continue;
            }
            let trx_size = trx.serialized_size()? as u64;
            if block_size + trx_size >= max_block_size {
                postponed += 1;
                continue;
            }
            let position = OperationPosition {
                block: block_num,
                trx_in_block: block.transactions.len() as u32,
                ..Default::default()
            };
            self.state.start_undo();
            match self.apply_transaction(&trx, skip, position) {
                Ok(()) => {
                    self.state.squash();
                    block_size += trx_size;
                    block.transactions.push(trx);
                }
                Err(err) => {
                    self.state.undo();
                    debug!("pending transaction left out of block {}: {}", block_num, err);
                }
            }
        }
        if postponed > 0 {
            warn!(
                "postponed {} transactions of block {} over the size limit",
                postponed, block_num
            );
        }
        self.clear_pending();

        let mut header = block.header.header.clone();
        header.transaction_merkle_root = block.calculate_merkle_root()?;
        if running_version != BLOCKCHAIN_VERSION {
            header
                .extensions
                .push(BlockHeaderExtension::Version(BLOCKCHAIN_VERSION));
        }
        if let Some(hardfork_vote) = self.hardfork_vote(vote)? {
            header
                .extensions
                .push(BlockHeaderExtension::HardforkVersionVote(hardfork_vote));
        }
        block.header = SignedBlockHeader::new_signed(header, &signing_key)?;

        if !skip.contains(SkipFlags::BLOCK_SIZE_CHECK) {
            let size = block.serialized_size()? as u64;
            if size > max_block_size {
                return Err(ChainError::InvalidBlock(format!(
                    "produced block of {} bytes exceeds {} bytes",
                    size, max_block_size
                )));
            }
        }

        self.push_block(block.clone(), skip)?;
        info!(
            "produced block {} by {} with {} transactions",
            block_num,
            bobserver,
            block.transactions.len()
        );
        Ok(block)
    }

    /// Vote aligning the producer with the hardforks this node knows about.
    ///
    /// A producer behind the last known hardfork votes for the next one, a
    /// producer voting for a hardfork unknown to this node votes to stay.
    fn hardfork_vote(
        &self,
        (voted_version, voted_time): (HardforkVersion, SigmaTime),
    ) -> ChainResult<Option<HardforkVersionVote>> {
        let property = self.state.hardfork_property()?;
        let last = property.last_hardfork;
        let Some(known) = self.hardforks.version(self.hardforks.last()) else {
            return Ok(None);
        };
        if property.current_hardfork_version < known {
            let next = (self.hardforks.version(last + 1), self.hardforks.time(last + 1));
            if let (Some(hf_version), Some(hf_time)) = next {
                if voted_version != hf_version || voted_time != hf_time {
                    return Ok(Some(HardforkVersionVote { hf_version, hf_time }));
                }
            }
        } else if property.current_hardfork_version == known && voted_version > known {
            let current = (self.hardforks.version(last), self.hardforks.time(last));
            if let (Some(hf_version), Some(hf_time)) = current {
                return Ok(Some(HardforkVersionVote { hf_version, hf_time }));
            }
        }
        Ok(None)
    }
}
