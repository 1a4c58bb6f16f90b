// Copyright (c) 2024 SIGMA ENGINE

//! The chain: state, reversible blocks and pending transactions.
//!
//! The state carries one undo revision per reversible block, numbered by
//! block height. Pending transactions live in one more revision on top, the
//! pending session, which is reverted before any block is applied and
//! rebuilt afterwards.

mod apply;
mod produce;

use crate::block_log::BlockLog;
use crate::custom_op::{default_interpreters, CustomOperationInterpreter, InterpreterRegistry};
use crate::evaluator::{ApplyContext, OperationPosition};
use crate::fork_database::{ForkDatabase, ForkItem};
use crate::genesis::init_genesis;
use crate::hardfork::HardforkTable;
use crate::schedule;
use crate::state::ChainState;
use sigma_chain_exports::objects::TransactionObject;
use sigma_chain_exports::{ChainConfig, ChainError, ChainObserver, ChainResult, SkipFlags};
use sigma_db::UndoableState;
use sigma_hash::Hash;
use sigma_logging::sigma_trace;
use sigma_models::{AccountName, BlockId, SignedBlock, SignedTransaction};
use sigma_time::SigmaTime;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Room left in a block for its header when checking a transaction size
const BLOCK_HEADER_RESERVE: u64 = 256;

/// Chain state with its block and transaction pipeline
pub struct Chain {
    state: ChainState,
    config: ChainConfig,
    chain_id: Hash,
    hardforks: HardforkTable,
    fork_db: ForkDatabase,
    block_log: BlockLog,
    pending_transactions: Vec<SignedTransaction>,
    popped_transactions: VecDeque<SignedTransaction>,
    pending_session: bool,
    observers: Vec<Arc<dyn ChainObserver>>,
    interpreters: InterpreterRegistry,
    producing: bool,
}

impl Chain {
    /// Chain at its genesis state
    pub fn new(config: ChainConfig, observers: Vec<Arc<dyn ChainObserver>>) -> ChainResult<Self> {
        let mut state = ChainState::default();
        init_genesis(&mut state, &config)?;
        Ok(Chain {
            state,
            chain_id: config.chain_id(),
            hardforks: HardforkTable::new(&config),
            fork_db: ForkDatabase::new(config.max_undo_history),
            block_log: BlockLog::default(),
            pending_transactions: Vec::new(),
            popped_transactions: VecDeque::new(),
            pending_session: false,
            observers,
            interpreters: default_interpreters(),
            producing: false,
            config,
        })
    }

    /// Registers the interpreter of the custom operations with id `id`
    pub fn set_custom_operation_interpreter(
        &mut self,
        id: impl Into<String>,
        interpreter: Arc<dyn CustomOperationInterpreter>,
    ) {
        self.interpreters.insert(id.into(), interpreter);
    }

    /// Registers an observer, called after the already registered ones
    pub fn add_observer(&mut self, observer: Arc<dyn ChainObserver>) {
        self.observers.push(observer);
    }

    /// Head state, pending transactions included
    pub fn state(&self) -> &ChainState {
        &self.state
    }

    /// Chain parameters
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Chain id mixed into transaction digests
    pub fn chain_id(&self) -> Hash {
        self.chain_id
    }

    /// Transactions waiting for the next produced block
    pub fn pending_transactions(&self) -> &[SignedTransaction] {
        &self.pending_transactions
    }

    fn context(&mut self, position: OperationPosition) -> ApplyContext<'_> {
        ApplyContext::new(
            &mut self.state,
            &self.config,
            &self.interpreters,
            &self.observers,
            self.producing,
            position,
        )
    }

    /// Producer of the slot `slot` after the head block
    pub fn get_scheduled_bobserver(&self, slot: u32) -> ChainResult<AccountName> {
        schedule::get_scheduled_bobserver(&self.state, slot)
    }

    /// Start of the slot `slot` after the head block
    pub fn get_slot_time(&self, slot: u32) -> ChainResult<SigmaTime> {
        schedule::get_slot_time(&self.state, &self.config, slot)
    }

    /// Slot containing `when`
    pub fn get_slot_at_time(&self, when: SigmaTime) -> ChainResult<u32> {
        schedule::get_slot_at_time(&self.state, &self.config, when)
    }

    /// Whether a transaction with this id was applied and has not expired
    pub fn is_known_transaction(&self, trx_id: &Hash) -> bool {
        self.state
            .transactions
            .find_by(TransactionObject::BY_TRX_ID, &TransactionObject::key(trx_id))
            .is_some()
    }

    /// Whether the block was applied or waits in the fork database
    pub fn is_known_block(&self, id: &BlockId) -> bool {
        if self.fork_db.is_known_block(id) {
            return true;
        }
        self.block_log
            .read_block_by_num(id.num())
            .and_then(|block| block.id().ok())
            .map_or(false, |logged| &logged == id)
    }

    /// Block of the current branch at height `num`
    pub fn get_block_by_num(&self, num: u32) -> Option<SignedBlock> {
        if let Some(block) = self.block_log.read_block_by_num(num) {
            return Some(block.clone());
        }
        let head_num = self.state.head_block_num().ok()?;
        if num > head_num {
            return None;
        }
        self.fork_db
            .fetch_block_on_main_branch_by_number(num)
            .map(|item| item.block.as_ref().clone())
    }

    /// Applies a block. Returns `true` when the head switched to another fork.
    ///
    /// The pending transactions are set aside during the application and
    /// applied again afterwards, dropping those that no longer apply.
    pub fn push_block(&mut self, block: SignedBlock, skip: SkipFlags) -> ChainResult<bool> {
        let pending = self.take_pending();
        let result = self.push_block_inner(block, skip);
        self.restore_pending(pending);
        result
    }

    fn push_block_inner(&mut self, block: SignedBlock, skip: SkipFlags) -> ChainResult<bool> {
        let block_id = block.id()?;
        sigma_trace!("chain.push_block", {
            "block_id": block_id.to_string(),
            "block_num": block.block_num(),
            "bobserver": block.bobserver().to_string(),
        });
        if !skip.contains(SkipFlags::FORK_DB) {
            let new_head = self.fork_db.push_block(block.clone())?;
            let head_id = self.state.head_block_id()?;
            if new_head.previous() != head_id {
                if new_head.num() > self.state.head_block_num()? {
                    self.switch_forks(new_head, head_id, skip)?;
                    return Ok(true);
                }
                debug!("block {} kept on a shorter fork", block_id);
                return Ok(false);
            }
        }
        if let Err(err) = self.apply_block_in_session(&block, skip) {
            warn!("block {} rejected: {}", block_id, err);
            self.fork_db.remove(&block_id);
            self.fork_db.set_head(self.state.head_block_id()?);
            return Err(err);
        }
        Ok(false)
    }

    /// Applies `block` in a new undo revision, kept on success, then commits
    /// the blocks that became irreversible
    fn apply_block_in_session(&mut self, block: &SignedBlock, skip: SkipFlags) -> ChainResult<()> {
        if skip.contains(SkipFlags::UNDO_BLOCK) {
            self.apply_block(block, skip)?;
            self.state.set_revision(block.block_num() as i64)?;
        } else {
            self.state.start_undo();
            if let Err(err) = self.apply_block(block, skip) {
                self.state.undo();
                return Err(err);
            }
        }
        self.commit_irreversible_blocks(skip)
    }

    fn switch_forks(&mut self, new_head: ForkItem, old_head: BlockId, skip: SkipFlags) -> ChainResult<()> {
        let (new_branch, old_branch) = self.fork_db.fetch_branch_from(new_head.id, old_head)?;
        let ancestor = new_branch
            .last()
            .map(ForkItem::previous)
            .ok_or_else(|| ChainError::UnlinkableBlock("empty fork branch".to_string()))?;
        info!(
            "switching to fork {} at height {}, common ancestor {}",
            new_head.id,
            new_head.num(),
            ancestor
        );
        sigma_trace!("chain.switch_forks", {
            "new_head": new_head.id.to_string(),
            "old_head": old_head.to_string(),
            "ancestor": ancestor.to_string(),
        });
        self.pop_to(ancestor)?;

        for (index, item) in new_branch.iter().enumerate().rev() {
            let Err(err) = self.apply_block_in_session(&item.block, skip) else {
                continue;
            };
            warn!("fork block {} rejected, restoring {}: {}", item.id, old_head, err);
            for failed in &new_branch[..=index] {
                self.fork_db.remove(&failed.id);
            }
            self.fork_db.set_head(old_head);
            self.pop_to(ancestor)?;
            for old in old_branch.iter().rev() {
                self.apply_block_in_session(&old.block, skip)?;
            }
            return Err(err);
        }
        Ok(())
    }

    fn pop_to(&mut self, ancestor: BlockId) -> ChainResult<()> {
        while self.state.head_block_id()? != ancestor {
            self.pop_block_inner()?;
        }
        Ok(())
    }

    /// Reverts the head block and queues its transactions for the next
    /// produced block
    pub fn pop_block(&mut self) -> ChainResult<()> {
        let pending = self.take_pending();
        let result = self.pop_block_inner();
        self.restore_pending(pending);
        result
    }

    fn pop_block_inner(&mut self) -> ChainResult<()> {
        let head_id = self.state.head_block_id()?;
        let head = self.fork_db.fetch_block(&head_id).ok_or_else(|| {
            ChainError::InvalidBlock(format!("head block {} is not reversible", head_id))
        })?;
        if self.state.undo_depth() == 0 {
            return Err(ChainError::InvalidBlock(format!(
                "head block {} is irreversible",
                head_id
            )));
        }
        self.state.undo();
        self.fork_db.set_head(head.previous());
        for trx in head.block.transactions.iter().rev() {
            self.popped_transactions.push_front(trx.clone());
        }
        debug!("popped block {}", head_id);
        Ok(())
    }

    /// Applies a transaction on top of the pending state and queues it for
    /// the next produced block
    pub fn push_transaction(&mut self, trx: SignedTransaction, skip: SkipFlags) -> ChainResult<()> {
        let size = trx.serialized_size()? as u64;
        let max_size = self
            .state
            .dynamic_global_properties()?
            .maximum_block_size
            .saturating_sub(BLOCK_HEADER_RESERVE);
        if size > max_size {
            return Err(ChainError::InvalidOperation(format!(
                "transaction of {} bytes exceeds {} bytes",
                size, max_size
            )));
        }
        self.producing = true;
        let result = self.push_transaction_inner(&trx, skip);
        self.producing = false;
        result?;
        sigma_trace!("chain.push_transaction", { "trx_id": trx.id()?.to_string() });
        Ok(())
    }

    fn push_transaction_inner(&mut self, trx: &SignedTransaction, skip: SkipFlags) -> ChainResult<()> {
        if !self.pending_session {
            self.state.start_undo();
            self.pending_session = true;
        }
        let position = OperationPosition {
            block: self.state.head_block_num()? + 1,
            trx_in_block: self.pending_transactions.len() as u32,
            ..Default::default()
        };
        self.state.start_undo();
        match self.apply_transaction(trx, skip, position) {
            Ok(()) => {
                self.state.squash();
                self.pending_transactions.push(trx.clone());
                for observer in &self.observers {
                    observer.on_pending_transaction(trx);
                }
                Ok(())
            }
            Err(err) => {
                self.state.undo();
                Err(err)
            }
        }
    }

    /// Reverts the pending session
    fn clear_pending(&mut self) {
        if self.pending_session {
            self.state.undo();
            self.pending_session = false;
        }
    }

    fn take_pending(&mut self) -> Vec<SignedTransaction> {
        self.clear_pending();
        std::mem::take(&mut self.pending_transactions)
    }

    /// Applies the popped then the pending transactions again, dropping
    /// those already applied or failing
    fn restore_pending(&mut self, pending: Vec<SignedTransaction>) {
        let popped: Vec<SignedTransaction> = self.popped_transactions.drain(..).collect();
        for trx in popped.into_iter().chain(pending) {
            let trx_id = match trx.id() {
                Ok(trx_id) => trx_id,
                Err(err) => {
                    warn!("dropped undecodable pending transaction: {}", err);
                    continue;
                }
            };
            if self.is_known_transaction(&trx_id) {
                continue;
            }
            if let Err(err) = self.push_transaction_inner(&trx, SkipFlags::NOTHING) {
                warn!("dropped pending transaction {}: {}", trx_id, err);
            }
        }
    }
}
