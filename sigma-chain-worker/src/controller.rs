// Copyright (c) 2024 SIGMA ENGINE

//! Implementation of the chain controller.
//! See `sigma-chain-exports/controller_traits.rs` for functional details.

use crate::chain::Chain;
use crate::custom_op::CustomOperationInterpreter;
use sigma_chain_exports::objects::{
    account_prefix, AccountHistoryObject, AccountObject, BobserverObject, BobserverScheduleObject,
    DynamicGlobalPropertyObject, HardforkPropertyObject, OperationObject,
};
use sigma_chain_exports::{ChainController, ChainError, ChainResult, SkipFlags};
use sigma_db::SharedDatabase;
use sigma_hash::Hash;
use sigma_models::{AccountName, BlockId, SignedBlock, SignedTransaction};
use sigma_signature::PrivateKey;
use sigma_time::SigmaTime;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Implementation of the chain controller, cloned freely between users
#[derive(Clone)]
pub struct ChainControllerImpl {
    pub(crate) chain: SharedDatabase<Chain>,
    pub(crate) stopped: Arc<AtomicBool>,
}

impl ChainControllerImpl {
    /// Controller over `chain`
    pub fn new(chain: Chain) -> Self {
        ChainControllerImpl {
            chain: SharedDatabase::new(chain),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers the interpreter of the custom operations with id `id`
    pub fn set_custom_operation_interpreter(
        &self,
        id: &str,
        interpreter: Arc<dyn CustomOperationInterpreter>,
    ) {
        self.chain
            .with_write_lock(|chain| chain.set_custom_operation_interpreter(id, interpreter));
    }

    fn write<R>(&self, f: impl FnOnce(&mut Chain) -> ChainResult<R>) -> ChainResult<R> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(ChainError::Stopped);
        }
        self.chain.with_write_lock(f)
    }
}

impl ChainController for ChainControllerImpl {
    fn push_block(&self, block: SignedBlock, skip: SkipFlags) -> ChainResult<bool> {
        self.write(|chain| chain.push_block(block, skip))
    }

    fn push_transaction(&self, trx: SignedTransaction, skip: SkipFlags) -> ChainResult<()> {
        self.write(|chain| chain.push_transaction(trx, skip))
    }

    fn generate_block(
        &self,
        when: SigmaTime,
        bobserver: AccountName,
        signing_key: PrivateKey,
        skip: SkipFlags,
    ) -> ChainResult<SignedBlock> {
        self.write(|chain| chain.generate_block(when, bobserver, signing_key, skip))
    }

    fn pop_block(&self) -> ChainResult<()> {
        self.write(|chain| chain.pop_block())
    }

    fn chain_id(&self) -> Hash {
        self.chain.read().chain_id()
    }

    fn get_dynamic_global_properties(&self) -> ChainResult<DynamicGlobalPropertyObject> {
        self.chain
            .with_read_lock(|chain| Ok(chain.state().dynamic_global_properties()?.clone()))
    }

    fn get_hardfork_property(&self) -> ChainResult<HardforkPropertyObject> {
        self.chain
            .with_read_lock(|chain| Ok(chain.state().hardfork_property()?.clone()))
    }

    fn get_bobserver_schedule(&self) -> ChainResult<BobserverScheduleObject> {
        self.chain
            .with_read_lock(|chain| Ok(chain.state().bobserver_schedule()?.clone()))
    }

    fn get_account(&self, name: &AccountName) -> Option<AccountObject> {
        self.chain.with_read_lock(|chain| {
            chain
                .state()
                .find_account(name)
                .map(|(_, account)| account.clone())
        })
    }

    fn get_bobserver(&self, name: &AccountName) -> Option<BobserverObject> {
        self.chain.with_read_lock(|chain| {
            chain
                .state()
                .find_bobserver(name)
                .map(|(_, bobserver)| bobserver.clone())
        })
    }

    fn get_scheduled_bobserver(&self, slot: u32) -> ChainResult<AccountName> {
        self.chain
            .with_read_lock(|chain| chain.get_scheduled_bobserver(slot))
    }

    fn get_slot_time(&self, slot: u32) -> ChainResult<SigmaTime> {
        self.chain.with_read_lock(|chain| chain.get_slot_time(slot))
    }

    fn get_slot_at_time(&self, when: SigmaTime) -> ChainResult<u32> {
        self.chain.with_read_lock(|chain| chain.get_slot_at_time(when))
    }

    fn get_block_by_num(&self, num: u32) -> Option<SignedBlock> {
        self.chain.with_read_lock(|chain| chain.get_block_by_num(num))
    }

    fn is_known_block(&self, id: &BlockId) -> bool {
        self.chain.with_read_lock(|chain| chain.is_known_block(id))
    }

    fn get_account_history(
        &self,
        name: &AccountName,
        from: u32,
        limit: u32,
    ) -> Vec<(u32, OperationObject)> {
        self.chain.with_read_lock(|chain| {
            let state = chain.state();
            let prefix = account_prefix(name);
            let Ok(entries) = state
                .account_history
                .range_by(AccountHistoryObject::BY_ACCOUNT_SEQUENCE, &prefix)
            else {
                return Vec::new();
            };
            entries
                .filter(|(_, entry)| entry.sequence <= from)
                .take(limit as usize)
                .filter_map(|(_, entry)| {
                    state
                        .operations
                        .get(entry.op)
                        .ok()
                        .map(|op| (entry.sequence, op.clone()))
                })
                .collect()
        })
    }

    fn clone_box(&self) -> Box<dyn ChainController> {
        Box::new(self.clone())
    }
}
