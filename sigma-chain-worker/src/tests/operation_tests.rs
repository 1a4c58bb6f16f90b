// Copyright (c) 2024 SIGMA ENGINE

use super::tools::*;
use crate::{GenericCustomOperationInterpreter, ProducerVoteOperation};
use assert_matches::assert_matches;
use sigma_chain_exports::test_exports::test_chain_config;
use sigma_chain_exports::{ChainError, ErrorKind};
use sigma_models::constants::{BASE_SYMBOL, DEPOSIT_FUND_NAME, INIT_MINER_NAME, ROOT_ACCOUNT};
use sigma_models::test_exports::{account_authority, account_key, base, transfer};
use sigma_models::{
    AccountName, AccountUpdateOperation, Authority, BurnOperation, CancelTransferSavingsOperation,
    ConclusionStakingOperation, ConclusionTransferSavingsOperation, CustomJsonOperation, DeclineVotingRightsOperation,
    HardforkOperation, Operation, PrintOperation, RecoverAccountOperation,
    RequestAccountRecoveryOperation, ReturnStakingFundOperation, SetFundInterestOperation,
    StakingFundOperation, TransferFundOperation, TransferSavingsOperation,
};
use sigma_signature::PublicKey;
use std::collections::BTreeSet;
use std::sync::Arc;

fn root() -> AccountName {
    AccountName::new(ROOT_ACCOUNT)
}

fn vote_json(account: &str, bobserver: &str) -> String {
    serde_json::json!({
        "type": "account_bobserver_vote",
        "value": {"account": account, "bobserver": bobserver, "approve": true},
    })
    .to_string()
}

fn custom_json(auth: &str, id: &str, json: String) -> Operation {
    Operation::CustomJson(CustomJsonOperation {
        required_auths: BTreeSet::from([AccountName::new(auth)]),
        required_posting_auths: BTreeSet::new(),
        id: id.to_string(),
        json,
    })
}

#[test]
fn test_overdraft_is_rejected_and_balances_kept() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice", "bob"], "100");

    push(&mut chain, vec![transfer("alice", "bob", "40")], &["alice"]).unwrap();
    let err = push(&mut chain, vec![transfer("alice", "bob", "70")], &["alice"]).unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InsufficientBalance { .. });
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert_eq!(chain.pending_transactions().len(), 1);

    let block = produce(&mut chain);
    assert_eq!(block.transactions.len(), 1);
    assert_eq!(balance(&chain, "alice"), amount("60"));
    assert_eq!(balance(&chain, "bob"), amount("140"));
}

#[test]
fn test_failed_operation_reverts_its_transaction() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice", "bob"], "100");

    let err = push(
        &mut chain,
        vec![transfer("alice", "bob", "50"), transfer("alice", "bob", "70")],
        &["alice"],
    )
    .unwrap_err();
    assert_matches!(err, ChainError::OperationFailed { op_in_trx: 1, .. });
    assert_eq!(balance(&chain, "alice"), amount("100"));
    assert_eq!(balance(&chain, "bob"), amount("100"));
    assert!(chain.pending_transactions().is_empty());
}

#[test]
fn test_signatures_must_match_the_authorities() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice", "bob"], "100");

    let err = push(&mut chain, vec![transfer("alice", "bob", "1")], &["bob"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authority);
    let err = push(&mut chain, vec![transfer("alice", "bob", "1")], &["alice", "bob"]).unwrap_err();
    assert_matches!(err, ChainError::IrrelevantSignature(_));
    push(&mut chain, vec![transfer("alice", "bob", "1")], &["alice"]).unwrap();
}

#[test]
fn test_duplicate_transaction_is_rejected() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice", "bob"], "100");

    let trx = sign(&chain, vec![transfer("alice", "bob", "10")], &["alice"]);
    chain
        .push_transaction(trx.clone(), sigma_chain_exports::SkipFlags::NOTHING)
        .unwrap();
    let err = chain
        .push_transaction(trx.clone(), sigma_chain_exports::SkipFlags::NOTHING)
        .unwrap_err();
    assert_matches!(err, ChainError::DuplicateTransaction(_));

    produce(&mut chain);
    assert!(chain.is_known_transaction(&trx.id().unwrap()));
    let err = chain
        .push_transaction(trx, sigma_chain_exports::SkipFlags::NOTHING)
        .unwrap_err();
    assert_matches!(err, ChainError::DuplicateTransaction(_));
    assert_eq!(balance(&chain, "bob"), amount("110"));
}

#[test]
fn test_virtual_operations_cannot_be_submitted() {
    let mut chain = new_chain(test_chain_config());
    let err = push(
        &mut chain,
        vec![Operation::Hardfork(HardforkOperation { hardfork_id: 1 })],
        &[INIT_MINER_NAME],
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_print_and_burn_move_the_supply() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice"], "");
    let supply = chain
        .state()
        .dynamic_global_properties()
        .unwrap()
        .supply(BASE_SYMBOL);

    push(
        &mut chain,
        vec![
            Operation::Print(PrintOperation {
                root: root(),
                account: AccountName::new("alice"),
                amount: base("500"),
            }),
            Operation::Burn(BurnOperation {
                root: root(),
                account: AccountName::new("alice"),
                amount: base("200"),
            }),
        ],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    let err = push(
        &mut chain,
        vec![Operation::Burn(BurnOperation {
            root: root(),
            account: AccountName::new("alice"),
            amount: base("301"),
        })],
        &[INIT_MINER_NAME],
    )
    .unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InsufficientBalance { .. });

    let err = push(
        &mut chain,
        vec![Operation::Print(PrintOperation {
            root: AccountName::new("alice"),
            account: AccountName::new("alice"),
            amount: base("1"),
        })],
        &["alice"],
    )
    .unwrap_err();
    assert_matches!(err.root_cause(), ChainError::NotRootAccount(_));

    produce(&mut chain);
    assert_eq!(balance(&chain, "alice"), amount("300"));
    let dgp = chain.state().dynamic_global_properties().unwrap();
    assert_eq!(
        dgp.supply(BASE_SYMBOL),
        supply.checked_add(amount("300")).unwrap()
    );
    chain.state().validate_invariants().unwrap();
}

#[test]
fn test_staking_matures_with_interest() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice"], "2000");
    let observer = RecordingObserver::new();
    chain.add_observer(observer.clone());

    push(
        &mut chain,
        vec![Operation::SetFundInterest(SetFundInterestOperation {
            root: root(),
            fund_name: DEPOSIT_FUND_NAME.to_string(),
            usertype: 0,
            month: 6,
            percent_interest: "2".to_string(),
        })],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    let stake = |month: u8| {
        Operation::StakingFund(StakingFundOperation {
            from: AccountName::new("alice"),
            fund_name: DEPOSIT_FUND_NAME.to_string(),
            request_id: month as u32,
            amount: base("1000"),
            memo: "savings".to_string(),
            usertype: 0,
            month,
        })
    };
    let err = push(&mut chain, vec![stake(3)], &["alice"]).unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InvalidOperation(_));
    push(&mut chain, vec![stake(6)], &["alice"]).unwrap();
    let staked_at = chain.state().head_block_time().unwrap();
    produce(&mut chain);

    assert_eq!(balance(&chain, "alice"), amount("1000"));
    let (_, withdraw) = chain
        .state()
        .get_fund_withdraw(&AccountName::new("alice"), DEPOSIT_FUND_NAME, 6)
        .unwrap();
    assert_eq!(withdraw.amount, base("1020"));
    assert_eq!(withdraw.complete, staked_at.saturating_add_secs(180 * 24 * 3600));
    let (_, fund) = chain.state().get_common_fund(DEPOSIT_FUND_NAME).unwrap();
    assert_eq!(fund.fund_balance, base("1000"));
    assert_eq!(fund.fund_withdraw_ready, base("1020"));

    let conclusion = Operation::ConclusionStaking(ConclusionStakingOperation {
        root: root(),
        from: AccountName::new("alice"),
        fund_name: DEPOSIT_FUND_NAME.to_string(),
        request_id: 6,
    });
    let err = push(&mut chain, vec![conclusion], &[INIT_MINER_NAME]).unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InvalidOperation(_));

    // the fund must hold the interest before paying out early
    let early_return = Operation::ReturnStakingFund(ReturnStakingFundOperation {
        root: root(),
        fund_name: DEPOSIT_FUND_NAME.to_string(),
        request_id: 6,
        to: AccountName::new("alice"),
    });
    let err = push(&mut chain, vec![early_return.clone()], &[INIT_MINER_NAME]).unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InsufficientFund { .. });
    push(
        &mut chain,
        vec![
            Operation::TransferFund(TransferFundOperation {
                from: AccountName::new(INIT_MINER_NAME),
                fund_name: DEPOSIT_FUND_NAME.to_string(),
                amount: base("20"),
                memo: String::new(),
            }),
            early_return,
        ],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    observer.take();
    produce(&mut chain);

    assert_eq!(balance(&chain, "alice"), amount("2020"));
    let (_, fund) = chain.state().get_common_fund(DEPOSIT_FUND_NAME).unwrap();
    assert!(fund.fund_balance.amount.is_zero());
    assert!(fund.fund_withdraw_ready.amount.is_zero());
    assert!(observer
        .take()
        .contains(&"post_op FillStakingFund".to_string()));
}

#[test]
fn test_savings_transfer_can_be_cancelled() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice", "bob"], "100");
    let complete = chain
        .state()
        .head_block_time()
        .unwrap()
        .saturating_add_secs(30 * 24 * 3600);
    push(
        &mut chain,
        vec![Operation::TransferSavings(TransferSavingsOperation {
            from: AccountName::new("alice"),
            request_id: 7,
            to: AccountName::new("bob"),
            amount: base("30"),
            total_amount: base("30"),
            split_pay_order: 1,
            split_pay_month: 1,
            memo: String::new(),
            complete,
        })],
        &["alice"],
    )
    .unwrap();
    produce(&mut chain);
    let bob = chain.state().get_account(&AccountName::new("bob")).unwrap().1;
    assert_eq!(bob.savings_balance(BASE_SYMBOL), amount("30"));
    assert_eq!(balance(&chain, "alice"), amount("70"));

    let cancel = |value: &str| {
        Operation::CancelTransferSavings(CancelTransferSavingsOperation {
            from: AccountName::new("alice"),
            to: AccountName::new("bob"),
            amount: base(value),
            request_id: 7,
        })
    };
    let err = push(&mut chain, vec![cancel("10")], &["alice"]).unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InvalidOperation(_));
    push(&mut chain, vec![cancel("30")], &["alice"]).unwrap();
    produce(&mut chain);
    assert_eq!(balance(&chain, "alice"), amount("100"));
    let bob = chain.state().get_account(&AccountName::new("bob")).unwrap().1;
    assert!(bob.savings_balance(BASE_SYMBOL).is_zero());
}

#[test]
fn test_savings_transfer_concludes_with_the_transferred_amount() {
    let mut chain = new_chain(test_chain_config());
    let observer = RecordingObserver::new();
    chain.add_observer(observer.clone());
    setup_accounts(&mut chain, &["alice", "bob"], "100");
    let complete = chain.state().head_block_time().unwrap().saturating_add_secs(1);
    push(
        &mut chain,
        vec![Operation::TransferSavings(TransferSavingsOperation {
            from: AccountName::new("alice"),
            request_id: 3,
            to: AccountName::new("bob"),
            amount: base("30"),
            total_amount: base("90"),
            split_pay_order: 1,
            split_pay_month: 3,
            memo: "rent".to_string(),
            complete,
        })],
        &["alice"],
    )
    .unwrap();
    produce(&mut chain);

    // the declared total is informative, the record keeps what moved
    let (_, withdraw) = chain
        .state()
        .get_savings_withdraw(&AccountName::new("alice"), 3)
        .unwrap();
    assert_eq!(withdraw.amount, base("30"));
    assert_eq!(withdraw.total_amount, base("30"));
    observer.take();

    push(
        &mut chain,
        vec![Operation::ConclusionTransferSavings(ConclusionTransferSavingsOperation {
            from: AccountName::new("alice"),
            to: AccountName::new("bob"),
            request_id: 3,
        })],
        &["alice"],
    )
    .unwrap();
    produce(&mut chain);
    assert_eq!(balance(&chain, "alice"), amount("70"));
    assert_eq!(balance(&chain, "bob"), amount("130"));
    let bob = chain.state().get_account(&AccountName::new("bob")).unwrap().1;
    assert!(bob.savings_balance(BASE_SYMBOL).is_zero());
    assert!(chain
        .state()
        .get_savings_withdraw(&AccountName::new("alice"), 3)
        .is_err());
    assert!(observer
        .take()
        .contains(&"post_op FillTransferSavings".to_string()));
}

#[test]
fn test_custom_operation_authorities_must_match() {
    let mut chain = new_chain(test_chain_config());
    push(
        &mut chain,
        vec![create_account_op("alice"), create_account_op("bp1"), register_producer_op("bp1")],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    produce(&mut chain);

    let footprint = |chain: &crate::Chain| {
        let state = chain.state();
        (
            state.bobserver_votes.len(),
            state.operations.len(),
            state.account_history.len(),
            state.transactions.len(),
            chain.pending_transactions().len(),
        )
    };
    let before = footprint(&chain);

    // the wrapper declares another account than the vote needs
    let err = push(
        &mut chain,
        vec![custom_json(INIT_MINER_NAME, ProducerVoteOperation::ID, vote_json("alice", "bp1"))],
        &[INIT_MINER_NAME],
    )
    .unwrap_err();
    assert_matches!(err.root_cause(), ChainError::AuthorityMismatch);

    // the wrapper declares more accounts than the vote needs
    let mut wider = custom_json("alice", ProducerVoteOperation::ID, vote_json("alice", "bp1"));
    if let Operation::CustomJson(op) = &mut wider {
        op.required_auths.insert(AccountName::new(INIT_MINER_NAME));
    }
    let err = push(&mut chain, vec![wider], &["alice", INIT_MINER_NAME]).unwrap_err();
    assert_matches!(err.root_cause(), ChainError::AuthorityMismatch);

    assert_eq!(footprint(&chain), before);
    let bp1 = AccountName::new("bp1");
    assert_eq!(chain.state().get_bobserver(&bp1).unwrap().1.votes, 0);
    let alice = chain.state().get_account(&AccountName::new("alice")).unwrap().1;
    assert_eq!(alice.bobservers_voted_for, 0);

    let err = push(
        &mut chain,
        vec![custom_json("alice", ProducerVoteOperation::ID, "{\"type\":\"unknown\"}".to_string())],
        &["alice"],
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RecoverableDecode);

    push(
        &mut chain,
        vec![custom_json("alice", ProducerVoteOperation::ID, vote_json("alice", "bp1"))],
        &["alice"],
    )
    .unwrap();
    // ids without interpreter are accepted as opaque payloads
    push(
        &mut chain,
        vec![custom_json("alice", "game", "{\"move\":\"e4\"}".to_string())],
        &["alice"],
    )
    .unwrap();
    produce(&mut chain);

    assert_eq!(chain.state().get_bobserver(&bp1).unwrap().1.votes, 1);
    let alice = chain.state().get_account(&AccountName::new("alice")).unwrap().1;
    assert_eq!(alice.bobservers_voted_for, 1);
}

#[test]
fn test_registered_interpreter_receives_its_id() {
    let mut chain = new_chain(test_chain_config());
    chain.set_custom_operation_interpreter(
        "votes-v2",
        Arc::new(GenericCustomOperationInterpreter::<ProducerVoteOperation>::new()),
    );
    push(
        &mut chain,
        vec![create_account_op("alice"), create_account_op("bp1"), register_producer_op("bp1")],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    push(
        &mut chain,
        vec![custom_json("alice", "votes-v2", vote_json("alice", "bp1"))],
        &["alice"],
    )
    .unwrap();
    produce(&mut chain);
    let bp1 = AccountName::new("bp1");
    assert_eq!(chain.state().get_bobserver(&bp1).unwrap().1.votes, 1);
}

#[test]
fn test_account_recovery_restores_ownership() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice"], "");
    let alice = AccountName::new("alice");
    let stolen = Authority::from_key(account_key("thief").public_key());
    let recovered = Authority::from_key(account_key("alice-new").public_key());

    push(
        &mut chain,
        vec![Operation::AccountUpdate(AccountUpdateOperation {
            account: alice.clone(),
            owner: Some(stolen.clone()),
            active: None,
            posting: None,
            memo_key: PublicKey::null(),
            json_metadata: String::new(),
        })],
        &["alice"],
    )
    .unwrap();
    produce(&mut chain);

    let err = push(
        &mut chain,
        vec![Operation::RequestAccountRecovery(RequestAccountRecoveryOperation {
            recovery_account: AccountName::new("root"),
            account_to_recover: alice.clone(),
            new_owner_authority: recovered.clone(),
        })],
        &[INIT_MINER_NAME],
    )
    .unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InvalidOperation(_));
    push(
        &mut chain,
        vec![Operation::RequestAccountRecovery(RequestAccountRecoveryOperation {
            recovery_account: AccountName::new(INIT_MINER_NAME),
            account_to_recover: alice.clone(),
            new_owner_authority: recovered.clone(),
        })],
        &[INIT_MINER_NAME],
    )
    .unwrap();
    produce(&mut chain);

    let never_owner = Authority::from_key(account_key("stranger").public_key());
    let err = push(
        &mut chain,
        vec![Operation::RecoverAccount(RecoverAccountOperation {
            account_to_recover: alice.clone(),
            new_owner_authority: recovered.clone(),
            recent_owner_authority: never_owner,
        })],
        &["alice-new", "stranger"],
    )
    .unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InvalidOperation(_));

    push(
        &mut chain,
        vec![Operation::RecoverAccount(RecoverAccountOperation {
            account_to_recover: alice.clone(),
            new_owner_authority: recovered.clone(),
            recent_owner_authority: account_authority("alice"),
        })],
        &["alice-new", "alice"],
    )
    .unwrap();
    produce(&mut chain);

    let (_, authority) = chain.state().get_account_authority(&alice).unwrap();
    assert_eq!(authority.owner, recovered);
    assert!(chain.state().recovery_requests.is_empty());
}

#[test]
fn test_recovery_request_is_replaced_then_deleted() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice"], "");
    let period = chain.config().account_recovery_request_expiration_period;
    let request = |authority: Authority| {
        Operation::RequestAccountRecovery(RequestAccountRecoveryOperation {
            recovery_account: AccountName::new(INIT_MINER_NAME),
            account_to_recover: AccountName::new("alice"),
            new_owner_authority: authority,
        })
    };
    let first = Authority::from_key(account_key("alice-new").public_key());
    let second = Authority::from_key(account_key("alice-other").public_key());

    let requested_at = chain.state().head_block_time().unwrap();
    push(&mut chain, vec![request(first.clone())], &[INIT_MINER_NAME]).unwrap();
    produce(&mut chain);
    let (_, pending) = chain.state().recovery_requests.iter().next().unwrap();
    assert_eq!(pending.new_owner_authority, first);
    assert_eq!(pending.expires, requested_at.saturating_add_secs(period));

    produce(&mut chain);
    let replaced_at = chain.state().head_block_time().unwrap();
    assert!(replaced_at > requested_at);
    push(&mut chain, vec![request(second.clone())], &[INIT_MINER_NAME]).unwrap();
    produce(&mut chain);
    assert_eq!(chain.state().recovery_requests.len(), 1);
    let (_, pending) = chain.state().recovery_requests.iter().next().unwrap();
    assert_eq!(pending.new_owner_authority, second);
    assert_eq!(pending.expires, replaced_at.saturating_add_secs(period));

    let withdrawn = Authority {
        weight_threshold: 0,
        ..second
    };
    push(&mut chain, vec![request(withdrawn)], &[INIT_MINER_NAME]).unwrap();
    produce(&mut chain);
    assert!(chain.state().recovery_requests.is_empty());
}

#[test]
fn test_decline_voting_rights_request_can_be_withdrawn() {
    let mut chain = new_chain(test_chain_config());
    setup_accounts(&mut chain, &["alice"], "");
    let decline = |decline: bool| {
        Operation::DeclineVotingRights(DeclineVotingRightsOperation {
            account: AccountName::new("alice"),
            decline,
        })
    };

    let err = push(&mut chain, vec![decline(false)], &["alice"]).unwrap_err();
    assert_matches!(err.root_cause(), ChainError::InvalidOperation(_));
    push(&mut chain, vec![decline(true)], &["alice"]).unwrap();
    produce(&mut chain);
    assert_eq!(chain.state().decline_voting_requests.len(), 1);

    push(&mut chain, vec![decline(false)], &["alice"]).unwrap();
    produce(&mut chain);
    assert!(chain.state().decline_voting_requests.is_empty());
    let alice = chain.state().get_account(&AccountName::new("alice")).unwrap().1;
    assert!(alice.can_vote);
}
