// Copyright (c) 2024 SIGMA ENGINE

use super::Chain;
use crate::authority::verify_authority;
use crate::evaluator::{ApplyContext, OperationPosition};
use crate::hardfork::process_hardforks;
use crate::schedule::update_bobserver_schedule;
use sigma_chain_exports::objects::TransactionObject;
use sigma_chain_exports::{ChainError, ChainResult, SkipFlags};
use sigma_db::{ObjectId, UndoableState};
use sigma_logging::sigma_trace;
use sigma_models::constants::{BLOCKS_PER_DAY, PERCENT_100};
use sigma_models::{
    BlockHeaderExtension, Operation, ShutdownBobserverOperation, SignedBlock, SignedTransaction,
};
use tracing::debug;

impl Chain {
    /// Applies a block on top of the head state, in the current revision
    pub(super) fn apply_block(&mut self, block: &SignedBlock, skip: SkipFlags) -> ChainResult<()> {
        let block_num = block.block_num();
        for observer in &self.observers {
            observer.pre_apply_block(block);
        }

        if !skip.contains(SkipFlags::MERKLE_CHECK) {
            let merkle_root = block.calculate_merkle_root()?;
            if merkle_root != block.header.header.transaction_merkle_root {
                return Err(ChainError::InvalidBlock(format!(
                    "merkle root {} of block {} does not match its transactions",
                    block.header.header.transaction_merkle_root, block_num
                )));
            }
        }
        self.validate_block_header(block, skip)?;
        if !skip.contains(SkipFlags::BLOCK_SIZE_CHECK) {
            let size = block.serialized_size()? as u64;
            let max_size = self.state.dynamic_global_properties()?.maximum_block_size;
            if size > max_size {
                return Err(ChainError::InvalidBlock(format!(
                    "block {} of {} bytes exceeds {} bytes",
                    block_num, size, max_size
                )));
            }
        }

        let producer = block.bobserver().clone();
        self.state
            .modify_dynamic_global_properties(|dgp| dgp.current_bobserver = producer.clone())?;
        self.process_header_extensions(block)?;
        let running_version = self.state.get_bobserver(&producer)?.1.running_version;
        let hardfork_version = self.state.hardfork_property()?.current_hardfork_version;
        if running_version < hardfork_version.to_version() {
            return Err(ChainError::InvalidBlock(format!(
                "{} runs {} but hardfork {} is applied",
                producer, running_version, hardfork_version
            )));
        }

        for (trx_in_block, trx) in block.transactions.iter().enumerate() {
            let position = OperationPosition {
                block: block_num,
                trx_in_block: trx_in_block as u32,
                ..Default::default()
            };
            self.apply_transaction(trx, skip, position)
                .map_err(|err| ChainError::TransactionFailed {
                    trx_in_block: trx_in_block as u32,
                    op_in_trx: match &err {
                        ChainError::OperationFailed { op_in_trx, .. } => *op_in_trx,
                        _ => 0,
                    },
                    source: Box::new(err),
                })?;
        }

        self.update_global_dynamic_data(block, skip)?;
        self.update_signing_bobserver(block)?;
        self.update_last_irreversible_block()?;
        self.clear_expired_transactions()?;

        let hardforks = self.hardforks.clone();
        let mut ctx = self.context(OperationPosition {
            block: block_num,
            ..Default::default()
        });
        update_bobserver_schedule(&mut ctx)?;
        process_account_recovery(&mut ctx)?;
        process_decline_voting_rights(&mut ctx)?;
        process_hardforks(&mut ctx, &hardforks)?;

        if !skip.contains(SkipFlags::VALIDATE_INVARIANTS) {
            self.state.validate_invariants()?;
        }
        for observer in &self.observers {
            observer.applied_block(block);
        }
        sigma_trace!("chain.apply_block", {
            "block_num": block_num,
            "transactions": block.transactions.len(),
        });
        Ok(())
    }

    fn validate_block_header(&self, block: &SignedBlock, skip: SkipFlags) -> ChainResult<()> {
        let head_id = self.state.head_block_id()?;
        if block.previous() != head_id {
            return Err(ChainError::InvalidBlock(format!(
                "block {} does not extend the head {}",
                block.block_num(),
                head_id
            )));
        }
        let head_time = self.state.head_block_time()?;
        if block.timestamp() <= head_time {
            return Err(ChainError::InvalidBlock(format!(
                "block time {} is not after the head time {}",
                block.timestamp(),
                head_time
            )));
        }
        let (_, producer) = self.state.get_bobserver(block.bobserver())?;
        if !skip.contains(SkipFlags::BOBSERVER_SIGNATURE) {
            block.header.validate_signee(&producer.signing_key)?;
        }
        if !skip.contains(SkipFlags::BOBSERVER_SCHEDULE_CHECK) {
            let slot = self.get_slot_at_time(block.timestamp())?;
            if slot == 0 {
                return Err(ChainError::InvalidBlock(format!(
                    "block time {} precedes the next slot",
                    block.timestamp()
                )));
            }
            let scheduled = self.get_scheduled_bobserver(slot)?;
            if &scheduled != block.bobserver() {
                return Err(ChainError::InvalidBlock(format!(
                    "{} produced slot {} scheduled for {}",
                    block.bobserver(),
                    slot,
                    scheduled
                )));
            }
        }
        Ok(())
    }

    /// Records the running version and the hardfork vote of the producer
    fn process_header_extensions(&mut self, block: &SignedBlock) -> ChainResult<()> {
        for extension in &block.header.header.extensions {
            match extension {
                BlockHeaderExtension::Version(version) => {
                    self.state.modify_bobserver(block.bobserver(), |producer| {
                        producer.running_version = *version
                    })?;
                }
                BlockHeaderExtension::HardforkVersionVote(vote) => {
                    self.state.modify_bobserver(block.bobserver(), |producer| {
                        producer.hardfork_version_vote = vote.hf_version;
                        producer.hardfork_time_vote = vote.hf_time;
                    })?;
                }
            }
        }
        Ok(())
    }

    /// Applies a transaction in the current revision
    pub(super) fn apply_transaction(
        &mut self,
        trx: &SignedTransaction,
        skip: SkipFlags,
        mut position: OperationPosition,
    ) -> ChainResult<()> {
        let trx_id = trx.id()?;
        if !skip.contains(SkipFlags::VALIDATE) {
            trx.transaction.validate()?;
        }
        if !skip.contains(SkipFlags::TRANSACTION_DUPE_CHECK) && self.is_known_transaction(&trx_id) {
            return Err(ChainError::DuplicateTransaction(trx_id.to_string()));
        }
        if !skip.contains(SkipFlags::TRANSACTION_SIGNATURES)
            && !skip.contains(SkipFlags::AUTHORITY_CHECK)
        {
            let signers = trx.signature_keys(&self.chain_id)?;
            verify_authority(
                &self.state,
                &trx.transaction.required_authorities(),
                &signers,
                self.config.max_sig_check_depth,
            )?;
        }
        let head_time = self.state.head_block_time()?;
        if self.state.head_block_num()? > 0 {
            let expiration = trx.transaction.expiration;
            if expiration <= head_time {
                return Err(ChainError::Expired(format!(
                    "transaction {} expired at {}, head time is {}",
                    trx_id, expiration, head_time
                )));
            }
            let limit = head_time.saturating_add_secs(self.config.max_time_until_expiration);
            if expiration > limit {
                return Err(ChainError::Expired(format!(
                    "expiration {} of transaction {} is after {}",
                    expiration, trx_id, limit
                )));
            }
        }
        if !skip.contains(SkipFlags::TRANSACTION_DUPE_CHECK) {
            self.state.transactions.create(TransactionObject {
                trx_id,
                expiration: trx.transaction.expiration,
            })?;
        }

        for observer in &self.observers {
            observer.on_pre_apply_transaction(trx);
        }
        position.trx_id = trx_id;
        let mut ctx = self.context(position);
        for (op_in_trx, op) in trx.transaction.operations.iter().enumerate() {
            ctx.position.op_in_trx = op_in_trx as u16;
            ctx.apply_operation(op)
                .map_err(|err| ChainError::OperationFailed {
                    op_in_trx: op_in_trx as u32,
                    source: Box::new(err),
                })?;
        }
        for observer in &self.observers {
            observer.on_applied_transaction(trx);
        }
        Ok(())
    }

    /// Counts missed slots, shuts down producers idle for a day and moves
    /// the head
    fn update_global_dynamic_data(&mut self, block: &SignedBlock, skip: SkipFlags) -> ChainResult<()> {
        let block_id = block.id()?;
        let mut missed_blocks = 0;
        if self.state.head_block_num()? > 0 {
            missed_blocks = self.get_slot_at_time(block.timestamp())?.saturating_sub(1);
            let head_num = self.state.head_block_num()?;
            let mut missed = Vec::new();
            for slot in 1..=missed_blocks {
                let scheduled = self.get_scheduled_bobserver(slot)?;
                if &scheduled != block.bobserver() {
                    missed.push(scheduled);
                }
            }
            let mut ctx = self.context(OperationPosition {
                block: block.block_num(),
                ..Default::default()
            });
            for name in missed {
                let Some((_, producer)) = ctx.state.find_bobserver(&name) else {
                    continue;
                };
                let idle = head_num.saturating_sub(producer.last_confirmed_block_num) > BLOCKS_PER_DAY;
                let shutdown = idle && !producer.signing_key.is_null();
                ctx.state.modify_bobserver(&name, |producer| {
                    producer.total_missed += 1;
                    if shutdown {
                        producer.signing_key = Default::default();
                    }
                })?;
                if shutdown {
                    ctx.push_virtual_operation(Operation::ShutdownBobserver(
                        ShutdownBobserverOperation { owner: name },
                    ))?;
                }
            }
        }

        self.state.modify_dynamic_global_properties(|dgp| {
            for i in 0..=missed_blocks {
                if dgp.recent_slots_filled >> 127 == 1 {
                    dgp.participation_count = dgp.participation_count.saturating_sub(1);
                }
                dgp.recent_slots_filled = (dgp.recent_slots_filled << 1) + u128::from(i == 0);
                if i == 0 {
                    dgp.participation_count = dgp.participation_count.saturating_add(1);
                }
            }
            dgp.head_block_number = block.block_num();
            dgp.head_block_id = block_id;
            dgp.time = block.timestamp();
            dgp.current_aslot += missed_blocks as u64 + 1;
        })?;

        if !skip.contains(SkipFlags::UNDO_HISTORY_CHECK) {
            let dgp = self.state.dynamic_global_properties()?;
            let reversible = dgp.head_block_number - dgp.last_irreversible_block_num;
            if reversible >= self.config.max_undo_history {
                return Err(ChainError::InvalidBlock(format!(
                    "{} reversible blocks exceed the undo history of {}",
                    reversible, self.config.max_undo_history
                )));
            }
        }
        Ok(())
    }

    fn update_signing_bobserver(&mut self, block: &SignedBlock) -> ChainResult<()> {
        let aslot = self.state.dynamic_global_properties()?.current_aslot
            + self.get_slot_at_time(block.timestamp())? as u64;
        let block_num = block.block_num();
        self.state.modify_bobserver(block.bobserver(), |producer| {
            producer.last_aslot = aslot;
            producer.last_confirmed_block_num = block_num;
        })
    }

    /// Moves the last irreversible block to the height confirmed by the
    /// threshold share of the scheduled producers
    fn update_last_irreversible_block(&mut self) -> ChainResult<()> {
        let schedule = self.state.bobserver_schedule()?;
        let mut confirmed: Vec<u32> = schedule
            .current_shuffled_bobservers
            .iter()
            .take(schedule.num_scheduled_bobservers as usize)
            .filter_map(|name| self.state.find_bobserver(name))
            .map(|(_, producer)| producer.last_confirmed_block_num)
            .collect();
        if confirmed.is_empty() {
            return Ok(());
        }
        confirmed.sort_unstable();
        let offset = ((PERCENT_100 - self.config.irreversible_threshold) as usize
            * confirmed.len())
            / PERCENT_100 as usize;
        let candidate = confirmed[offset.min(confirmed.len() - 1)];
        if candidate > self.state.dynamic_global_properties()?.last_irreversible_block_num {
            self.state
                .modify_dynamic_global_properties(|dgp| dgp.last_irreversible_block_num = candidate)?;
        }
        Ok(())
    }

    /// Makes the blocks up to the last irreversible one permanent: forgets
    /// their undo revisions and moves them to the block log.
    ///
    /// Runs once the whole block applied, its revision included.
    pub(super) fn commit_irreversible_blocks(&mut self, skip: SkipFlags) -> ChainResult<()> {
        let dgp = self.state.dynamic_global_properties()?;
        let last_irreversible = dgp.last_irreversible_block_num;
        let head_num = dgp.head_block_number;
        self.state.commit(last_irreversible as i64);

        if !skip.contains(SkipFlags::BLOCK_LOG) {
            while self.block_log.head_num() < last_irreversible {
                let num = self.block_log.head_num() + 1;
                let item = self
                    .fork_db
                    .fetch_block_on_main_branch_by_number(num)
                    .ok_or_else(|| {
                        ChainError::InvariantViolation(format!(
                            "irreversible block {} is missing from the fork database",
                            num
                        ))
                    })?;
                self.block_log.append(item.block.as_ref().clone())?;
            }
        }
        self.fork_db.set_max_size(head_num - last_irreversible + 1);
        Ok(())
    }

    /// Forgets the applied transactions that expired before the head time
    fn clear_expired_transactions(&mut self) -> ChainResult<()> {
        let head_time = self.state.head_block_time()?;
        let expired: Vec<ObjectId<TransactionObject>> = self
            .state
            .transactions
            .iter_by(TransactionObject::BY_EXPIRATION)?
            .take_while(|(_, trx)| trx.expiration < head_time)
            .map(|(id, _)| id)
            .collect();
        for id in expired {
            self.state.transactions.remove(id)?;
        }
        Ok(())
    }
}

/// Drops expired recovery requests and owner history past the recovery
/// window, then settles the recovery account changes that took effect
fn process_account_recovery(ctx: &mut ApplyContext<'_>) -> ChainResult<()> {
    let now = ctx.head_time()?;
    let expired: Vec<_> = ctx
        .state
        .recovery_requests
        .iter()
        .filter(|(_, request)| request.expires <= now)
        .map(|(id, _)| id)
        .collect();
    for id in expired {
        ctx.state.recovery_requests.remove(id)?;
    }

    let window = ctx.config.owner_auth_recovery_period;
    let outdated: Vec<_> = ctx
        .state
        .owner_history
        .iter()
        .filter(|(_, history)| history.last_valid_time.saturating_add_secs(window) < now)
        .map(|(id, _)| id)
        .collect();
    for id in outdated {
        ctx.state.owner_history.remove(id)?;
    }

    let effective: Vec<_> = ctx
        .state
        .change_recovery_requests
        .iter()
        .filter(|(_, request)| request.effective_on <= now)
        .map(|(id, request)| (id, request.account_to_recover.clone(), request.recovery_account.clone()))
        .collect();
    for (id, account, recovery_account) in effective {
        ctx.state
            .modify_account(&account, |account| account.recovery_account = recovery_account)?;
        ctx.state.change_recovery_requests.remove(id)?;
    }
    Ok(())
}

/// Withdraws every vote of the accounts whose renunciation took effect
fn process_decline_voting_rights(ctx: &mut ApplyContext<'_>) -> ChainResult<()> {
    let now = ctx.head_time()?;
    let effective: Vec<_> = ctx
        .state
        .decline_voting_requests
        .iter()
        .filter(|(_, request)| request.effective_date <= now)
        .map(|(id, request)| (id, request.account.clone()))
        .collect();
    for (id, account) in effective {
        ctx.state.clear_bobserver_votes(&account)?;
        ctx.state.modify_account(&account, |account| account.can_vote = false)?;
        ctx.state.decline_voting_requests.remove(id)?;
        debug!("{} lost its voting rights", account);
    }
    Ok(())
}

