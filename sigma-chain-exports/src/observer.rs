// Copyright (c) 2024 SIGMA ENGINE

use sigma_hash::Hash;
use sigma_models::{Operation, SignedBlock, SignedTransaction};
use sigma_time::SigmaTime;

/// An operation being applied, with its position in the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationNotification {
    /// enclosing transaction, zero for block-level virtual operations
    pub trx_id: Hash,
    /// block height
    pub block: u32,
    /// index of the transaction in the block
    pub trx_in_block: u32,
    /// index of the operation in the transaction
    pub op_in_trx: u16,
    /// rank of a virtual operation, 0 for a submitted one
    pub virtual_op: u32,
    /// block time
    pub timestamp: SigmaTime,
    /// the operation
    pub op: Operation,
}

/// Hooks called by the application pipeline.
///
/// Observers run synchronously in registration order while the chain is
/// locked for writing. They only receive values and cannot reach the state.
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait ChainObserver: Send + Sync {
    /// before an operation is evaluated
    fn pre_apply_operation(&self, _note: &OperationNotification) {}

    /// after an operation was evaluated, including virtual operations
    fn post_apply_operation(&self, _note: &OperationNotification) {}

    /// before a block is applied
    fn pre_apply_block(&self, _block: &SignedBlock) {}

    /// after a block was applied
    fn applied_block(&self, _block: &SignedBlock) {}

    /// a transaction entered the pending pool
    fn on_pending_transaction(&self, _trx: &SignedTransaction) {}

    /// before the operations of a transaction are applied
    fn on_pre_apply_transaction(&self, _trx: &SignedTransaction) {}

    /// after every operation of a transaction was applied
    fn on_applied_transaction(&self, _trx: &SignedTransaction) {}

    /// a hardfork was activated
    fn on_apply_hardfork(&self, _hardfork: u32) {}
}
