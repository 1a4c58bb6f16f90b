// Copyright (c) 2024 SIGMA ENGINE

use super::tools::*;
use crate::ProducerVoteOperation;
use assert_matches::assert_matches;
use mockall::Sequence;
use sigma_chain_exports::test_exports::test_chain_config;
use sigma_chain_exports::{ChainConfig, ChainError, MockChainObserver, SkipFlags};
use sigma_models::constants::{
    BLOCKCHAIN_VERSION, BLOCK_INTERVAL, GENESIS_TIME, HARDFORK_0_1_VERSION, INIT_MINER_NAME,
    ROOT_ACCOUNT, TEMP_ACCOUNT,
};
use sigma_models::test_exports::{account_key, signed_transaction, transfer};
use sigma_hash::Hash;
use sigma_models::{
    AccountName, AccountUpdateOperation, BlockHeader, BlockHeaderExtension, CustomJsonOperation,
    ExceptBobserverOperation, HardforkVersion, HardforkVersionVote, Operation, SignedBlock, SignedBlockHeader,
};
use std::collections::BTreeSet;
use std::sync::Arc;

fn sorted(mut names: Vec<AccountName>) -> Vec<AccountName> {
    names.sort();
    names
}

fn scheduled(chain: &crate::Chain) -> Vec<AccountName> {
    let schedule = chain.state().bobserver_schedule().unwrap();
    sorted(
        schedule
            .current_shuffled_bobservers
            .iter()
            .take(schedule.num_scheduled_bobservers as usize)
            .cloned()
            .collect(),
    )
}

#[test]
fn test_single_producer_chain() {
    let mut chain = new_chain(test_chain_config());
    let first_slot = GENESIS_TIME.saturating_add_secs(BLOCK_INTERVAL);
    assert_eq!(chain.get_slot_time(1).unwrap(), first_slot);
    assert_eq!(chain.get_slot_at_time(first_slot).unwrap(), 1);
    assert_eq!(chain.get_slot_at_time(GENESIS_TIME).unwrap(), 0);
    assert_eq!(
        chain.get_scheduled_bobserver(1).unwrap(),
        AccountName::new(INIT_MINER_NAME)
    );

    let blocks = produce_until(&mut chain, 3);
    assert_eq!(blocks.len(), 3);
    let dgp = chain.state().dynamic_global_properties().unwrap();
    assert_eq!(dgp.head_block_number, 3);
    assert_eq!(dgp.head_block_id, blocks[2].id().unwrap());
    // a lone producer confirms its own blocks
    assert_eq!(dgp.last_irreversible_block_num, 3);
    assert_eq!(chain.get_block_by_num(2).unwrap(), blocks[1]);
    assert!(chain.is_known_block(&blocks[0].id().unwrap()));
    assert!(chain.get_block_by_num(4).is_none());

    let err = chain.pop_block().unwrap_err();
    assert_matches!(err, ChainError::InvalidBlock(_));
}

#[test]
fn test_block_production_checks_the_slot() {
    let mut chain = new_chain(test_chain_config());
    let miner = AccountName::new(INIT_MINER_NAME);
    let when = chain.get_slot_time(1).unwrap();

    let head_time = chain.state().head_block_time().unwrap();
    let err = chain
        .generate_block(head_time, miner.clone(), account_key(INIT_MINER_NAME), SkipFlags::NOTHING)
        .unwrap_err();
    assert_matches!(err, ChainError::InvalidBlock(_));
    let err = chain
        .generate_block(when, AccountName::new("alice"), account_key("alice"), SkipFlags::NOTHING)
        .unwrap_err();
    assert_matches!(err, ChainError::InvalidBlock(_));
    let err = chain
        .generate_block(when, miner.clone(), account_key("mallory"), SkipFlags::NOTHING)
        .unwrap_err();
    assert_matches!(err, ChainError::InvalidBlock(_));

    chain
        .generate_block(when, miner, account_key(INIT_MINER_NAME), SkipFlags::NOTHING)
        .unwrap();
    assert_eq!(chain.state().head_block_num().unwrap(), 1);
}

#[test]
fn test_received_blocks_are_validated() {
    let mut producer = new_chain(test_chain_config());
    setup_accounts(&mut producer, &["alice"], "10");
    let block = producer.get_block_by_num(1).unwrap();
    let mut follower = new_chain(test_chain_config());

    let mut tampered = block.clone();
    tampered.transactions.clear();
    let err = follower.push_block(tampered, SkipFlags::NOTHING).unwrap_err();
    assert_matches!(err, ChainError::InvalidBlock(_));

    let mut forged = block.clone();
    forged.header =
        SignedBlockHeader::new_signed(block.header.header.clone(), &account_key("mallory")).unwrap();
    assert!(follower.push_block(forged, SkipFlags::NOTHING).is_err());
    assert_eq!(follower.state().head_block_num().unwrap(), 0);

    assert!(!follower.push_block(block.clone(), SkipFlags::NOTHING).unwrap());
    assert_eq!(
        follower.state().head_block_id().unwrap(),
        producer.state().head_block_id().unwrap()
    );
    assert_eq!(balance(&follower, "alice"), amount("10"));

    assert!(follower.push_block(block, SkipFlags::NOTHING).is_err());
    assert_eq!(follower.state().head_block_num().unwrap(), 1);
}

/// Block of the initial producer on top of the head, voting for `hf_version`
fn hardfork_vote_block(chain: &crate::Chain, hf_version: HardforkVersion) -> SignedBlock {
    let mut block = SignedBlock {
        header: SignedBlockHeader::unsigned(BlockHeader {
            previous: chain.state().head_block_id().unwrap(),
            timestamp: chain.get_slot_time(1).unwrap(),
            bobserver: AccountName::new(INIT_MINER_NAME),
            transaction_merkle_root: Hash::zero(),
            extensions: vec![BlockHeaderExtension::HardforkVersionVote(HardforkVersionVote {
                hf_version,
                hf_time: GENESIS_TIME,
            })],
        }),
        transactions: Vec::new(),
    };
    block.header.header.transaction_merkle_root = block.calculate_merkle_root().unwrap();
    block.header =
        SignedBlockHeader::new_signed(block.header.header.clone(), &account_key(INIT_MINER_NAME))
            .unwrap();
    block
}

#[test]
fn test_failed_block_is_not_committed() {
    let mut chain = new_chain(short_round_config());
    produce_until(&mut chain, 2);
    let head_id = chain.state().head_block_id().unwrap();
    // the lone producer makes every block irreversible at once
    assert_eq!(
        chain
            .state()
            .dynamic_global_properties()
            .unwrap()
            .last_irreversible_block_num,
        2
    );

    // block 3 closes the round, its vote for an unknown hardfork fails the block
    // after the irreversibility update
    let block = hardfork_vote_block(&chain, HardforkVersion::new(0, 9));
    let err = chain.push_block(block, SkipFlags::NOTHING).unwrap_err();
    assert_matches!(err, ChainError::InvariantViolation(_));

    let dgp = chain.state().dynamic_global_properties().unwrap();
    assert_eq!(dgp.head_block_number, 2);
    assert_eq!(dgp.head_block_id, head_id);
    assert_eq!(dgp.last_irreversible_block_num, 2);
    assert_eq!(chain.state().hardfork_property().unwrap().last_hardfork, 0);
    assert!(chain.get_block_by_num(3).is_none());

    let block = produce(&mut chain);
    assert_eq!(block.block_num(), 3);
    assert_eq!(chain.get_block_by_num(3).unwrap(), block);
    assert_eq!(chain.state().hardfork_property().unwrap().last_hardfork, 1);
}

#[test]
fn test_expiration_is_checked_past_genesis() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice", "bob"], "10");
    let head_time = chain.state().head_block_time().unwrap();
    let too_late = head_time.saturating_add_secs(chain.config().max_time_until_expiration + 1);
    let trusted = SkipFlags::TRANSACTION_SIGNATURES
        | SkipFlags::AUTHORITY_CHECK
        | SkipFlags::TRANSACTION_DUPE_CHECK;

    for expiration in [head_time, too_late] {
        let trx = signed_transaction(
            vec![transfer("alice", "bob", "1")],
            expiration,
            &[&account_key("alice")],
            &chain.chain_id(),
        );
        let err = chain.push_transaction(trx, trusted).unwrap_err();
        assert_matches!(err, ChainError::Expired(_));
    }
    assert!(chain.pending_transactions().is_empty());
    assert_eq!(balance(&chain, "alice"), amount("10"));
}

#[test]
fn test_schedule_follows_votes() {
    let config = ChainConfig {
        max_voted_bobservers: 2,
        ..short_round_config()
    };
    let mut chain = new_chain(config);
    push(
        &mut chain,
        vec![
            create_account_op("alice"),
            create_account_op("bp1"),
            create_account_op("bp2"),
            register_producer_op("bp1"),
            register_producer_op("bp2"),
        ],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    let vote = serde_json::json!([{
        "type": "account_bobserver_vote",
        "value": {"account": "alice", "bobserver": "bp2", "approve": true},
    }]);
    push(
        &mut chain,
        vec![Operation::CustomJson(CustomJsonOperation {
            required_auths: BTreeSet::from([AccountName::new("alice")]),
            required_posting_auths: BTreeSet::new(),
            id: ProducerVoteOperation::ID.to_string(),
            json: vote.to_string(),
        })],
        &["alice"],
    )
    .unwrap();
    produce_until(&mut chain, 3);

    // ties on votes are broken by name
    assert_eq!(
        scheduled(&chain),
        vec![AccountName::new("bp1"), AccountName::new("bp2")]
    );
    let when = chain.get_slot_time(1).unwrap();
    let err = chain
        .generate_block(
            when,
            AccountName::new(INIT_MINER_NAME),
            account_key(INIT_MINER_NAME),
            SkipFlags::NOTHING,
        )
        .unwrap_err();
    assert_matches!(err, ChainError::InvalidBlock(_));

    let blocks = produce_until(&mut chain, 6);
    let producers: BTreeSet<_> = blocks.iter().map(|block| block.bobserver().clone()).collect();
    assert_eq!(
        producers,
        BTreeSet::from([AccountName::new("bp1"), AccountName::new("bp2")])
    );
    let bp1 = chain.state().get_bobserver(&AccountName::new("bp1")).unwrap().1;
    assert!(bp1.last_confirmed_block_num > 3);
}

#[test]
fn test_hardfork_activates_once_voted() {
    let mut chain = new_chain(short_round_config());
    let observer = RecordingObserver::new();
    chain.add_observer(observer.clone());

    produce_until(&mut chain, 2);
    assert_eq!(chain.state().hardfork_property().unwrap().last_hardfork, 0);
    produce(&mut chain);

    let property = chain.state().hardfork_property().unwrap();
    assert_eq!(property.last_hardfork, 1);
    assert_eq!(property.current_hardfork_version, HARDFORK_0_1_VERSION);
    assert_eq!(property.processed_hardforks.len(), 2);
    assert!(observer.take().contains(&"hardfork 1".to_string()));

    let err = push(
        &mut chain,
        vec![Operation::AccountUpdate(AccountUpdateOperation {
            account: AccountName::new(TEMP_ACCOUNT),
            owner: None,
            active: None,
            posting: None,
            memo_key: Default::default(),
            json_metadata: "{}".to_string(),
        })],
        &[],
    )
    .unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InvalidOperation(_));
}

#[test]
fn test_schedule_is_identical_on_every_node() {
    let config = ChainConfig {
        max_voted_bobservers: 2,
        ..short_round_config()
    };
    let mut producer = new_chain(config.clone());
    push(
        &mut producer,
        vec![
            create_account_op("alice"),
            create_account_op("bp1"),
            create_account_op("bp2"),
            create_account_op("bp3"),
            register_producer_op("bp1"),
            register_producer_op("bp2"),
            register_producer_op("bp3"),
            Operation::ExceptBobserver(ExceptBobserverOperation {
                root: AccountName::new(ROOT_ACCOUNT),
                bobserver: AccountName::new("bp1"),
            }),
        ],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    let vote = serde_json::json!([{
        "type": "account_bobserver_vote",
        "value": {"account": "alice", "bobserver": INIT_MINER_NAME, "approve": true},
    }]);
    push(
        &mut producer,
        vec![Operation::CustomJson(CustomJsonOperation {
            required_auths: BTreeSet::from([AccountName::new("alice")]),
            required_posting_auths: BTreeSet::new(),
            id: ProducerVoteOperation::ID.to_string(),
            json: vote.to_string(),
        })],
        &["alice"],
    )
    .unwrap();
    produce_until(&mut producer, 3);

    let mut follower = new_chain(config);
    for num in 1..=3 {
        let block = producer.get_block_by_num(num).unwrap();
        follower.push_block(block, SkipFlags::NOTHING).unwrap();
    }

    let schedule = producer.state().bobserver_schedule().unwrap().clone();
    assert_eq!(follower.state().bobserver_schedule().unwrap(), &schedule);
    assert_eq!(
        follower.state().hardfork_property().unwrap(),
        producer.state().hardfork_property().unwrap()
    );

    // the excepted producer is shut down, the voted one beats bp3
    assert_eq!(
        scheduled(&producer),
        vec![AccountName::new("bp2"), AccountName::new(INIT_MINER_NAME)]
    );
    let (_, excepted) = follower.state().get_bobserver(&AccountName::new("bp1")).unwrap();
    assert!(excepted.signing_key.is_null());
    assert_eq!(schedule.num_scheduled_bobservers, 2);
    assert_eq!(schedule.next_shuffle_block_num, 5);

    // tallied over the previous round, which the initial producer filled
    assert_eq!(schedule.majority_version, BLOCKCHAIN_VERSION);
    let hardforks = follower.state().hardfork_property().unwrap();
    assert_eq!(hardforks.next_hardfork, HARDFORK_0_1_VERSION);
    assert_eq!(hardforks.last_hardfork, 1);
}

/// Two nodes sharing their first three blocks, after which three producers
/// are scheduled
fn forked_nodes() -> (crate::Chain, crate::Chain) {
    let mut first = new_chain(short_round_config());
    setup_producers(&mut first, &["bp1", "bp2"]);
    produce_until(&mut first, 3);
    let mut second = new_chain(short_round_config());
    for num in 1..=3 {
        let block = first.get_block_by_num(num).unwrap();
        second.push_block(block, SkipFlags::NOTHING).unwrap();
    }
    assert_eq!(scheduled(&first).len(), 3);
    (first, second)
}

#[test]
fn test_longer_fork_wins() {
    let (mut first, mut second) = forked_nodes();
    push(
        &mut first,
        vec![transfer(INIT_MINER_NAME, "bp1", "10")],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    let own = produce(&mut first);
    assert_eq!(own.transactions.len(), 1);

    // the other node misses the first slot
    let fork_4 = produce_at(&mut second, 2);
    let fork_5 = produce(&mut second);

    assert!(!first.push_block(fork_4.clone(), SkipFlags::NOTHING).unwrap());
    assert_eq!(first.state().head_block_id().unwrap(), own.id().unwrap());
    assert!(first.is_known_block(&fork_4.id().unwrap()));

    assert!(first.push_block(fork_5.clone(), SkipFlags::NOTHING).unwrap());
    assert_eq!(first.state().head_block_id().unwrap(), fork_5.id().unwrap());
    assert_eq!(first.get_block_by_num(4).unwrap(), fork_4);

    // the transfer of the abandoned block waits for the next block
    assert_eq!(first.pending_transactions().len(), 1);
    assert_eq!(balance(&first, "bp1"), amount("10"));
    let missed = first
        .state()
        .get_bobserver(own.bobserver())
        .unwrap()
        .1
        .total_missed;
    assert_eq!(missed, 1);
}

#[test]
fn test_pop_block_returns_transactions_to_pending() {
    let (mut chain, _) = forked_nodes();
    push(
        &mut chain,
        vec![transfer(INIT_MINER_NAME, "bp2", "25")],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    let block = produce(&mut chain);
    assert!(chain.pending_transactions().is_empty());

    chain.pop_block().unwrap();
    assert_eq!(chain.state().head_block_num().unwrap(), 3);
    assert_eq!(chain.pending_transactions(), &block.transactions[..]);
    assert_eq!(balance(&chain, "bp2"), amount("25"));

    // block 3 is irreversible
    let err = chain.pop_block().unwrap_err();
    assert_matches!(err, ChainError::InvalidBlock(_));

    let again = produce(&mut chain);
    assert_eq!(again.transactions, block.transactions);
    assert_eq!(balance(&chain, "bp2"), amount("25"));
}

#[test]
fn test_pending_transactions_survive_received_blocks() {
    let (mut first, mut second) = forked_nodes();
    push(
        &mut second,
        vec![transfer(INIT_MINER_NAME, "bp1", "5")],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    let trx = second.pending_transactions()[0].clone();
    first
        .push_transaction(trx.clone(), SkipFlags::NOTHING)
        .unwrap();
    push(
        &mut first,
        vec![transfer(INIT_MINER_NAME, "bp2", "7")],
        &[INIT_MINER_NAME],
    )
    .unwrap();

    let block = produce(&mut second);
    assert!(!first.push_block(block, SkipFlags::NOTHING).unwrap());
    // the shared transaction is in the block, the other one still pending
    assert_eq!(first.pending_transactions().len(), 1);
    assert_ne!(first.pending_transactions()[0], trx);
    assert_eq!(balance(&first, "bp1"), amount("5"));
    assert_eq!(balance(&first, "bp2"), amount("7"));
}

#[test]
fn test_observers_follow_the_pipeline() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice", "bob"], "100");
    let observer = RecordingObserver::new();
    chain.add_observer(observer.clone());

    push(&mut chain, vec![transfer("alice", "bob", "1")], &["alice"]).unwrap();
    assert_eq!(
        observer.take(),
        vec!["pre_trx", "pre_op Transfer", "post_op Transfer", "trx", "pending"]
    );

    produce(&mut chain);
    let applied = ["pre_trx", "pre_op Transfer", "post_op Transfer", "trx"];
    let mut expected: Vec<&str> = applied.to_vec();
    expected.push("pre_block 2");
    expected.extend(applied);
    expected.push("block 2");
    assert_eq!(observer.take(), expected);
}

#[test]
fn test_observer_hooks_are_called_once_per_application() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice", "bob"], "100");

    let mut observer = MockChainObserver::new();
    // once in the pending state, once while building the block, once in the block
    observer
        .expect_on_pre_apply_transaction()
        .times(3)
        .return_const(());
    observer
        .expect_on_applied_transaction()
        .times(3)
        .return_const(());
    observer.expect_pre_apply_operation().times(3).return_const(());
    observer.expect_post_apply_operation().times(3).return_const(());
    observer
        .expect_on_pending_transaction()
        .times(1)
        .return_const(());
    let mut block_hooks = Sequence::new();
    observer
        .expect_pre_apply_block()
        .times(1)
        .in_sequence(&mut block_hooks)
        .return_const(());
    observer
        .expect_applied_block()
        .times(1)
        .in_sequence(&mut block_hooks)
        .return_const(());
    observer.expect_on_apply_hardfork().never();
    chain.add_observer(Arc::new(observer));

    push(&mut chain, vec![transfer("alice", "bob", "1")], &["alice"]).unwrap();
    produce(&mut chain);
}
