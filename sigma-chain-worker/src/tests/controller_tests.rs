// Copyright (c) 2024 SIGMA ENGINE

use crate::start_chain_worker;
use assert_matches::assert_matches;
use serial_test::serial;
use sigma_chain_exports::test_exports::test_chain_config;
use sigma_chain_exports::{ChainController, ChainError, SkipFlags};
use sigma_models::constants::INIT_MINER_NAME;
use sigma_models::test_exports::{account_key, signed_transaction, transfer};
use sigma_models::{AccountName, Operation, SignedBlock};

fn produce(controller: &dyn ChainController) -> SignedBlock {
    let when = controller.get_slot_time(1).unwrap();
    let producer = controller.get_scheduled_bobserver(1).unwrap();
    let key = account_key(producer.as_str());
    controller
        .generate_block(when, producer, key, SkipFlags::NOTHING)
        .unwrap()
}

#[test]
#[serial]
fn test_controller_serves_the_chain() {
    let (mut manager, controller) = start_chain_worker(test_chain_config(), Vec::new()).unwrap();
    let first = produce(controller.as_ref());
    assert_eq!(controller.get_block_by_num(1), Some(first.clone()));
    assert!(controller.is_known_block(&first.id().unwrap()));

    let head_time = controller.get_dynamic_global_properties().unwrap().time;
    let trx = signed_transaction(
        vec![
            super::tools::create_account_op("alice"),
            transfer(INIT_MINER_NAME, "alice", "3"),
        ],
        head_time.saturating_add_secs(60),
        &[&account_key(INIT_MINER_NAME)],
        &controller.chain_id(),
    );
    controller.push_transaction(trx, SkipFlags::NOTHING).unwrap();
    let second = produce(controller.as_ref());
    assert_eq!(second.transactions.len(), 1);
    assert_eq!(
        controller.get_dynamic_global_properties().unwrap().head_block_number,
        2
    );

    let alice = AccountName::new("alice");
    assert!(controller.get_account(&alice).is_some());
    let history = controller.get_account_history(&alice, u32::MAX, 10);
    let sequences: Vec<u32> = history.iter().map(|(sequence, _)| *sequence).collect();
    assert_eq!(sequences, vec![1, 0]);
    assert_matches!(history[0].1.op, Operation::Transfer(_));
    assert_matches!(history[1].1.op, Operation::AccountCreate(_));
    assert_eq!(controller.get_account_history(&alice, 0, 10).len(), 1);

    let miner = AccountName::new(INIT_MINER_NAME);
    assert_eq!(controller.get_bobserver(&miner).unwrap().last_confirmed_block_num, 2);
    assert_eq!(controller.get_bobserver_schedule().unwrap().num_scheduled_bobservers, 1);
    assert_eq!(controller.get_hardfork_property().unwrap().last_hardfork, 0);
    manager.stop();
}

#[test]
#[serial]
fn test_stopped_chain_refuses_writes() {
    let (mut manager, controller) = start_chain_worker(test_chain_config(), Vec::new()).unwrap();
    let other = controller.clone();
    produce(controller.as_ref());
    manager.stop();

    let when = other.get_slot_time(1).unwrap();
    let err = other
        .generate_block(
            when,
            AccountName::new(INIT_MINER_NAME),
            account_key(INIT_MINER_NAME),
            SkipFlags::NOTHING,
        )
        .unwrap_err();
    assert_matches!(err, ChainError::Stopped);
    assert_matches!(other.pop_block(), Err(ChainError::Stopped));
    // queries keep working
    assert_eq!(
        other.get_dynamic_global_properties().unwrap().head_block_number,
        1
    );
}
