// Copyright (c) 2024 SIGMA ENGINE

//! Interfaces of a running chain

use crate::error::ChainResult;
use crate::objects::{
    AccountObject, BobserverObject, BobserverScheduleObject, DynamicGlobalPropertyObject,
    HardforkPropertyObject, OperationObject,
};
use crate::skip_flags::SkipFlags;
use sigma_hash::Hash;
use sigma_models::{AccountName, BlockId, SignedBlock, SignedTransaction};
use sigma_signature::PrivateKey;
use sigma_time::SigmaTime;

/// Handle on a running chain. Writes are serialized, reads run concurrently.
#[cfg_attr(any(test, feature = "test-exports"), mockall::automock)]
pub trait ChainController: Send + Sync {
    /// Applies a block received from the network or produced locally.
    ///
    /// Returns `true` when the head switched to another fork.
    fn push_block(&self, block: SignedBlock, skip: SkipFlags) -> ChainResult<bool>;

    /// Applies a transaction on top of the pending state and keeps it for
    /// the next produced block
    fn push_transaction(&self, trx: SignedTransaction, skip: SkipFlags) -> ChainResult<()>;

    /// Produces, signs and applies a block for the slot at `when`
    fn generate_block(
        &self,
        when: SigmaTime,
        bobserver: AccountName,
        signing_key: PrivateKey,
        skip: SkipFlags,
    ) -> ChainResult<SignedBlock>;

    /// Reverts the head block
    fn pop_block(&self) -> ChainResult<()>;

    /// Chain id
    fn chain_id(&self) -> Hash;

    /// Global properties of the head state
    fn get_dynamic_global_properties(&self) -> ChainResult<DynamicGlobalPropertyObject>;

    /// Hardfork progress of the head state
    fn get_hardfork_property(&self) -> ChainResult<HardforkPropertyObject>;

    /// Current producer schedule
    fn get_bobserver_schedule(&self) -> ChainResult<BobserverScheduleObject>;

    /// Account by name
    fn get_account(&self, name: &AccountName) -> Option<AccountObject>;

    /// Producer by name
    fn get_bobserver(&self, name: &AccountName) -> Option<BobserverObject>;

    /// Producer scheduled for the slot `slot` after the head block, 1-based
    fn get_scheduled_bobserver(&self, slot: u32) -> ChainResult<AccountName>;

    /// Time of the slot `slot` after the head block
    fn get_slot_time(&self, slot: u32) -> ChainResult<SigmaTime>;

    /// Slot at time `when`, 0 when it is not after the head block
    fn get_slot_at_time(&self, when: SigmaTime) -> ChainResult<u32>;

    /// Block of the current chain by height
    fn get_block_by_num(&self, num: u32) -> Option<SignedBlock>;

    /// Whether the block is known, applied or waiting in the fork database
    fn is_known_block(&self, id: &BlockId) -> bool;

    /// History of an account, most recent first, starting at sequence `from`
    fn get_account_history(
        &self,
        name: &AccountName,
        from: u32,
        limit: u32,
    ) -> Vec<(u32, OperationObject)>;

    /// Returns a boxed clone of self.
    /// Useful to allow cloning `Box<dyn ChainController>`.
    fn clone_box(&self) -> Box<dyn ChainController>;
}

/// Allow cloning `Box<dyn ChainController>`
impl Clone for Box<dyn ChainController> {
    fn clone(&self) -> Box<dyn ChainController> {
        self.clone_box()
    }
}

/// Chain manager used to stop the chain
pub trait ChainManager {
    /// Stops the chain, further writes are refused
    fn stop(&mut self);
}
