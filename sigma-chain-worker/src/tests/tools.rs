// Copyright (c) 2024 SIGMA ENGINE

use crate::Chain;
use sigma_chain_exports::test_exports::test_chain_config;
use sigma_chain_exports::{ChainConfig, ChainObserver, ChainResult, OperationNotification, SkipFlags};
use sigma_models::constants::{BASE_SYMBOL, INIT_MINER_NAME, ROOT_ACCOUNT};
use sigma_models::test_exports::{account_authority, account_key, signed_transaction, transfer};
use sigma_models::{
    AccountCreateOperation, AccountName, Amount, BobserverUpdateOperation, Operation, SignedBlock,
    SignedTransaction,
};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

/// Test chain with three-slot rounds, so that schedules and hardfork
/// tallies change after a few blocks
pub fn short_round_config() -> ChainConfig {
    ChainConfig {
        num_bobservers: 3,
        hardfork_required_bobservers: 1,
        ..test_chain_config()
    }
}

pub fn new_chain(config: ChainConfig) -> Chain {
    Chain::new(config, Vec::new()).expect("genesis")
}

/// Transaction expiring ten minutes after the head block
pub fn sign(chain: &Chain, operations: Vec<Operation>, signers: &[&str]) -> SignedTransaction {
    let expiration = chain
        .state()
        .head_block_time()
        .expect("head time")
        .saturating_add_secs(600);
    let keys: Vec<_> = signers.iter().map(|name| account_key(name)).collect();
    let refs: Vec<_> = keys.iter().collect();
    signed_transaction(operations, expiration, &refs, &chain.chain_id())
}

pub fn push(chain: &mut Chain, operations: Vec<Operation>, signers: &[&str]) -> ChainResult<()> {
    let trx = sign(chain, operations, signers);
    chain.push_transaction(trx, SkipFlags::NOTHING)
}

/// Block of the producer scheduled `slot` slots after the head
pub fn produce_at(chain: &mut Chain, slot: u32) -> SignedBlock {
    let when = chain.get_slot_time(slot).expect("slot time");
    let producer = chain.get_scheduled_bobserver(slot).expect("scheduled producer");
    let key = account_key(producer.as_str());
    chain
        .generate_block(when, producer, key, SkipFlags::NOTHING)
        .expect("block production")
}

pub fn produce(chain: &mut Chain) -> SignedBlock {
    produce_at(chain, 1)
}

pub fn produce_until(chain: &mut Chain, height: u32) -> Vec<SignedBlock> {
    let mut blocks = Vec::new();
    while chain.state().head_block_num().expect("head") < height {
        blocks.push(produce(chain));
    }
    blocks
}

pub fn create_account_op(name: &str) -> Operation {
    Operation::AccountCreate(AccountCreateOperation {
        creator: AccountName::new(INIT_MINER_NAME),
        new_account_name: AccountName::new(name),
        owner: account_authority(name),
        active: account_authority(name),
        posting: account_authority(name),
        memo_key: account_key(name).public_key(),
        json_metadata: String::new(),
    })
}

pub fn register_producer_op(name: &str) -> Operation {
    Operation::BobserverUpdate(BobserverUpdateOperation {
        root: AccountName::new(ROOT_ACCOUNT),
        owner: AccountName::new(name),
        url: format!("https://{}.example", name),
        block_signing_key: account_key(name).public_key(),
    })
}

/// Creates `names` and funds each of them with `funds` out of the initial
/// supply, in the next block
pub fn setup_accounts(chain: &mut Chain, names: &[&str], funds: &str) {
    let mut operations: Vec<Operation> = names.iter().map(|name| create_account_op(name)).collect();
    if !funds.is_empty() {
        operations.extend(
            names
                .iter()
                .map(|name| transfer(INIT_MINER_NAME, name, funds)),
        );
    }
    push(chain, operations, &[INIT_MINER_NAME]).expect("account setup");
    produce(chain);
}

/// Creates and registers the producers `names` in the next block
pub fn setup_producers(chain: &mut Chain, names: &[&str]) {
    let mut operations: Vec<Operation> = names.iter().map(|name| create_account_op(name)).collect();
    operations.extend(names.iter().map(|name| register_producer_op(name)));
    push(chain, operations, &[INIT_MINER_NAME]).expect("producer setup");
    produce(chain);
}

pub fn balance(chain: &Chain, name: &str) -> Amount {
    chain
        .state()
        .get_account(&AccountName::new(name))
        .expect("account")
        .1
        .balance(BASE_SYMBOL)
}

pub fn amount(value: &str) -> Amount {
    Amount::from_str(value).expect("amount")
}

/// Observer keeping the name of every hook in call order
#[derive(Default)]
pub struct RecordingObserver {
    pub calls: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, call: String) {
        self.calls.lock().expect("observer lock").push(call);
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.calls.lock().expect("observer lock"))
    }
}

impl ChainObserver for RecordingObserver {
    fn pre_apply_operation(&self, note: &OperationNotification) {
        self.record(format!("pre_op {:?}", note.op.op_type()));
    }

    fn post_apply_operation(&self, note: &OperationNotification) {
        self.record(format!("post_op {:?}", note.op.op_type()));
    }

    fn pre_apply_block(&self, block: &SignedBlock) {
        self.record(format!("pre_block {}", block.block_num()));
    }

    fn applied_block(&self, block: &SignedBlock) {
        self.record(format!("block {}", block.block_num()));
    }

    fn on_pending_transaction(&self, _trx: &SignedTransaction) {
        self.record("pending".to_string());
    }

    fn on_pre_apply_transaction(&self, _trx: &SignedTransaction) {
        self.record("pre_trx".to_string());
    }

    fn on_applied_transaction(&self, _trx: &SignedTransaction) {
        self.record("trx".to_string());
    }

    fn on_apply_hardfork(&self, hardfork: u32) {
        self.record(format!("hardfork {}", hardfork));
    }
}
