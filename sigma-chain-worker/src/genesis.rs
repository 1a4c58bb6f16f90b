// Copyright (c) 2024 SIGMA ENGINE

//! State of the chain before its first block.

use crate::state::ChainState;
use sigma_chain_exports::objects::{
    AccountAuthorityObject, AccountObject, BobserverObject, BobserverScheduleObject,
    CommonFundObject, DynamicGlobalPropertyObject, HardforkPropertyObject,
};
use sigma_chain_exports::{ChainConfig, ChainResult};
use sigma_db::UndoableState;
use sigma_models::constants::{
    BASE_SYMBOL, BLOCKCHAIN_VERSION, DEPOSIT_FUND_NAME, MINER_ACCOUNT, NULL_ACCOUNT,
    ROOT_ACCOUNT, TEMP_ACCOUNT,
};
use sigma_models::{AccountName, Asset, Authority, BlockId, HardforkVersion};
use sigma_signature::PublicKey;
use sigma_time::SigmaTime;
use std::collections::BTreeMap;
use tracing::info;

fn create_account(
    state: &mut ChainState,
    name: &AccountName,
    memo_key: PublicKey,
    authority: Authority,
    created: SigmaTime,
) -> ChainResult<()> {
    state
        .accounts
        .create(AccountObject::new(name.clone(), memo_key, created))?;
    state.account_authorities.create(AccountAuthorityObject {
        account: name.clone(),
        owner: authority.clone(),
        active: authority.clone(),
        posting: authority,
        last_owner_update: SigmaTime::from_secs(0),
    })?;
    Ok(())
}

/// Creates the genesis state: the system accounts, the initial producer
/// holding the initial supply, the singletons and the deposit fund.
///
/// The revision of the state is the height of its head block, 0 here.
pub fn init_genesis(state: &mut ChainState, config: &ChainConfig) -> ChainResult<()> {
    let now = config.genesis_time;
    let init_key = config.init_public_key;
    let init_miner = &config.init_miner_name;

    create_account(state, &AccountName::new(MINER_ACCOUNT), PublicKey::default(), Authority::new(1), now)?;
    create_account(state, &AccountName::new(NULL_ACCOUNT), PublicKey::default(), Authority::new(1), now)?;
    create_account(state, &AccountName::new(TEMP_ACCOUNT), PublicKey::default(), Authority::new(0), now)?;
    create_account(state, &AccountName::new(ROOT_ACCOUNT), init_key, Authority::from_key(init_key), now)?;
    create_account(state, init_miner, init_key, Authority::from_key(init_key), now)?;

    let mut producer = BobserverObject::new(init_miner.clone(), now, init_key);
    producer.running_version = BLOCKCHAIN_VERSION;
    state.bobservers.create(producer)?;

    let mut current_supply = BTreeMap::new();
    current_supply.insert(BASE_SYMBOL, config.init_supply);
    state.global_properties.create(DynamicGlobalPropertyObject {
        head_block_number: 0,
        head_block_id: BlockId::zero(),
        time: now,
        current_bobserver: init_miner.clone(),
        current_supply,
        maximum_block_size: config.maximum_block_size,
        current_aslot: 0,
        recent_slots_filled: u128::MAX,
        participation_count: 128,
        last_irreversible_block_num: 0,
    })?;
    state.add_balance(init_miner, &Asset::new(config.init_supply, BASE_SYMBOL))?;

    let mut shuffled = vec![init_miner.clone()];
    shuffled.resize(config.num_bobservers.max(1) as usize, AccountName::default());
    state.schedule.create(BobserverScheduleObject {
        current_shuffled_bobservers: shuffled,
        num_scheduled_bobservers: 1,
        next_shuffle_block_num: config.num_bobservers,
        majority_version: BLOCKCHAIN_VERSION,
        max_voted_bobservers: config.max_voted_bobservers,
        max_miner_bobservers: config.max_miner_bobservers,
        max_runner_bobservers: config.max_runner_bobservers,
        hardfork_required_bobservers: config.hardfork_required_bobservers,
    })?;

    state.hardfork_properties.create(HardforkPropertyObject {
        processed_hardforks: vec![now],
        last_hardfork: 0,
        current_hardfork_version: HardforkVersion::default(),
        next_hardfork: HardforkVersion::default(),
        next_hardfork_time: now,
    })?;

    state
        .common_funds
        .create(CommonFundObject::new(DEPOSIT_FUND_NAME, now))?;

    state.set_revision(0)?;
    state.validate_invariants()?;
    info!(
        "genesis at {} with {} held by {}",
        now,
        Asset::new(config.init_supply, BASE_SYMBOL),
        init_miner
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_chain_exports::test_exports::test_chain_config;

    #[test]
    fn test_genesis_holds_the_supply() {
        let config = test_chain_config();
        let mut state = ChainState::default();
        init_genesis(&mut state, &config).unwrap();
        let (_, miner) = state.get_account(&config.init_miner_name).unwrap();
        assert_eq!(miner.balance(BASE_SYMBOL), config.init_supply);
        assert_eq!(
            state.dynamic_global_properties().unwrap().supply(BASE_SYMBOL),
            config.init_supply
        );
        assert!(state.get_account(&AccountName::new(ROOT_ACCOUNT)).is_ok());
        assert!(state.get_common_fund(DEPOSIT_FUND_NAME).is_ok());
        assert_eq!(state.head_block_num().unwrap(), 0);
        assert!(state.has_hardfork(0).unwrap());
        assert!(!state.has_hardfork(1).unwrap());
        assert_eq!(state.revision(), 0);
    }
}
