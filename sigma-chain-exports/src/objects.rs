// Copyright (c) 2024 SIGMA ENGINE

//! Rows of the chain state.
//!
//! Every type here is stored in a table of the chain worker and returned by
//! the query methods of the controller.

use serde::Serialize;
use sigma_db::{KeyBuilder, Object, ObjectId};
use sigma_hash::Hash;
use sigma_models::constants::{MAX_STAKING_MONTH, MAX_USER_TYPE};
use sigma_models::{
    AccountName, Amount, Asset, AssetSymbol, Authority, BlockId, HardforkVersion, InterestRate,
    Operation, Version,
};
use sigma_signature::PublicKey;
use sigma_time::SigmaTime;
use std::collections::BTreeMap;

/// Index name shared by tables keyed by a single account name
pub const BY_NAME: &str = "by_name";
/// Index name shared by tables keyed by a single account
pub const BY_ACCOUNT: &str = "by_account";

fn name_key(name: &AccountName) -> Vec<u8> {
    KeyBuilder::new().str(name.as_str()).build()
}

/// Prefix selecting every row of `name` in an index starting with an account
pub fn account_prefix(name: &AccountName) -> Vec<u8> {
    name_key(name)
}

/// An account
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountObject {
    /// unique name
    pub name: AccountName,
    /// key used to encrypt memos
    pub memo_key: PublicKey,
    /// free-form JSON metadata
    pub json_metadata: String,
    /// creation time
    pub created: SigmaTime,
    /// last update of any authority
    pub last_account_update: SigmaTime,
    /// last successful recovery
    pub last_account_recovery: SigmaTime,
    /// account allowed to recover this one, empty when none
    pub recovery_account: AccountName,
    /// created by the chain itself
    pub mined: bool,
    /// whether the account may vote for bobservers
    pub can_vote: bool,
    /// number of bobservers the account votes for
    pub bobservers_voted_for: u16,
    /// liquid balances
    pub balances: BTreeMap<AssetSymbol, Amount>,
    /// savings balances
    pub savings_balances: BTreeMap<AssetSymbol, Amount>,
}

impl AccountObject {
    /// New account without balances
    pub fn new(name: AccountName, memo_key: PublicKey, created: SigmaTime) -> Self {
        AccountObject {
            name,
            memo_key,
            json_metadata: String::new(),
            created,
            last_account_update: SigmaTime::from_secs(0),
            last_account_recovery: SigmaTime::from_secs(0),
            recovery_account: AccountName::default(),
            mined: false,
            can_vote: true,
            bobservers_voted_for: 0,
            balances: BTreeMap::new(),
            savings_balances: BTreeMap::new(),
        }
    }

    /// Liquid balance of `symbol`
    pub fn balance(&self, symbol: AssetSymbol) -> Amount {
        self.balances.get(&symbol).copied().unwrap_or_default()
    }

    /// Savings balance of `symbol`
    pub fn savings_balance(&self, symbol: AssetSymbol) -> Amount {
        self.savings_balances
            .get(&symbol)
            .copied()
            .unwrap_or_default()
    }

    /// Liquid balance as an asset
    pub fn balance_asset(&self, symbol: AssetSymbol) -> Asset {
        Asset::new(self.balance(symbol), symbol)
    }
}

impl Object for AccountObject {
    const TABLE: &'static str = "account";
    const INDEXES: &'static [&'static str] = &[BY_NAME];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![name_key(&self.name)]
    }
}

/// Authorities of an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountAuthorityObject {
    /// owning account
    pub account: AccountName,
    /// owner authority
    pub owner: Authority,
    /// active authority
    pub active: Authority,
    /// posting authority
    pub posting: Authority,
    /// last change of the owner authority
    pub last_owner_update: SigmaTime,
}

impl Object for AccountAuthorityObject {
    const TABLE: &'static str = "account_authority";
    const INDEXES: &'static [&'static str] = &[BY_ACCOUNT];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![name_key(&self.account)]
    }
}

/// Previous owner authority of an account, kept for recovery
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OwnerAuthorityHistoryObject {
    /// owning account
    pub account: AccountName,
    /// replaced authority
    pub previous_owner_authority: Authority,
    /// time at which it was replaced
    pub last_valid_time: SigmaTime,
    /// insertion order
    pub sequence: u64,
}

impl OwnerAuthorityHistoryObject {
    /// Index by (account, sequence)
    pub const BY_ACCOUNT_SEQUENCE: &'static str = "by_account_sequence";
}

impl Object for OwnerAuthorityHistoryObject {
    const TABLE: &'static str = "owner_authority_history";
    const INDEXES: &'static [&'static str] = &[Self::BY_ACCOUNT_SEQUENCE];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![KeyBuilder::new()
            .str(self.account.as_str())
            .u64(self.sequence)
            .build()]
    }
}

/// A block producer
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BobserverObject {
    /// producing account
    pub account: AccountName,
    /// registration time
    pub created: SigmaTime,
    /// informational url
    pub url: String,
    /// accumulated vote weight
    pub votes: u64,
    /// block signing key, null when the producer is disabled
    pub signing_key: PublicKey,
    /// version reported in the last produced block
    pub running_version: Version,
    /// voted hardfork
    pub hardfork_version_vote: HardforkVersion,
    /// voted hardfork activation time
    pub hardfork_time_vote: SigmaTime,
    /// elected by the root account
    pub is_bproducer: bool,
    /// excluded by the root account
    pub is_excepted: bool,
    /// account that registered the producer
    pub bp_owner: AccountName,
    /// number of missed slots
    pub total_missed: u32,
    /// absolute slot of the last produced block
    pub last_aslot: u64,
    /// last block produced by this producer
    pub last_confirmed_block_num: u32,
}

impl BobserverObject {
    /// Index by (votes descending, name)
    pub const BY_VOTE_NAME: &'static str = "by_vote_name";

    /// New producer without votes
    pub fn new(account: AccountName, created: SigmaTime, signing_key: PublicKey) -> Self {
        BobserverObject {
            bp_owner: account.clone(),
            account,
            created,
            url: String::new(),
            votes: 0,
            signing_key,
            running_version: Version::default(),
            hardfork_version_vote: HardforkVersion::default(),
            hardfork_time_vote: SigmaTime::from_secs(0),
            is_bproducer: false,
            is_excepted: false,
            total_missed: 0,
            last_aslot: 0,
            last_confirmed_block_num: 0,
        }
    }

    /// Key of the producer in `BY_VOTE_NAME`
    pub fn vote_key(&self) -> Vec<u8> {
        KeyBuilder::new()
            .u64_desc(self.votes)
            .str(self.account.as_str())
            .build()
    }
}

impl Object for BobserverObject {
    const TABLE: &'static str = "bobserver";
    const INDEXES: &'static [&'static str] = &[BY_NAME, Self::BY_VOTE_NAME];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![name_key(&self.account), self.vote_key()]
    }
}

/// Vote of an account for a producer
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BobserverVoteObject {
    /// voter
    pub account: AccountName,
    /// producer
    pub bobserver: AccountName,
}

impl BobserverVoteObject {
    /// Index by (voter, producer)
    pub const BY_ACCOUNT_BOBSERVER: &'static str = "by_account_bobserver";
    /// Index by (producer, voter)
    pub const BY_BOBSERVER_ACCOUNT: &'static str = "by_bobserver_account";

    /// Key of a (voter, producer) pair in `BY_ACCOUNT_BOBSERVER`
    pub fn key(account: &AccountName, bobserver: &AccountName) -> Vec<u8> {
        KeyBuilder::new()
            .str(account.as_str())
            .str(bobserver.as_str())
            .build()
    }
}

impl Object for BobserverVoteObject {
    const TABLE: &'static str = "bobserver_vote";
    const INDEXES: &'static [&'static str] =
        &[Self::BY_ACCOUNT_BOBSERVER, Self::BY_BOBSERVER_ACCOUNT];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![
            Self::key(&self.account, &self.bobserver),
            Self::key(&self.bobserver, &self.account),
        ]
    }
}

/// Producer schedule of the current round
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BobserverScheduleObject {
    /// shuffled producers, empty names past `num_scheduled`
    pub current_shuffled_bobservers: Vec<AccountName>,
    /// number of scheduled producers
    pub num_scheduled_bobservers: u32,
    /// block at which the next round is computed
    pub next_shuffle_block_num: u32,
    /// version run by a qualified majority of the round
    pub majority_version: Version,
    /// maximal number of voted producers
    pub max_voted_bobservers: u32,
    /// maximal number of miner producers
    pub max_miner_bobservers: u32,
    /// maximal number of time-share producers
    pub max_runner_bobservers: u32,
    /// producers required to adopt a version or hardfork
    pub hardfork_required_bobservers: u32,
}

impl Object for BobserverScheduleObject {
    const TABLE: &'static str = "bobserver_schedule";
}

/// Chain-wide values updated by every block
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DynamicGlobalPropertyObject {
    /// height of the head block
    pub head_block_number: u32,
    /// id of the head block
    pub head_block_id: BlockId,
    /// time of the head block
    pub time: SigmaTime,
    /// producer of the head block
    pub current_bobserver: AccountName,
    /// supply of each asset
    pub current_supply: BTreeMap<AssetSymbol, Amount>,
    /// maximal block size
    pub maximum_block_size: u64,
    /// absolute slot of the head block since genesis
    pub current_aslot: u64,
    /// one bit per recent slot, set when the slot was filled
    pub recent_slots_filled: u128,
    /// number of set bits in `recent_slots_filled`
    pub participation_count: u8,
    /// last block that cannot be reverted
    pub last_irreversible_block_num: u32,
}

impl DynamicGlobalPropertyObject {
    /// Supply of `symbol`
    pub fn supply(&self, symbol: AssetSymbol) -> Amount {
        self.current_supply.get(&symbol).copied().unwrap_or_default()
    }
}

impl Object for DynamicGlobalPropertyObject {
    const TABLE: &'static str = "dynamic_global_property";
}

/// Hardfork progress
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HardforkPropertyObject {
    /// activation time of each applied hardfork, genesis first
    pub processed_hardforks: Vec<SigmaTime>,
    /// index of the last applied hardfork
    pub last_hardfork: u32,
    /// version of the last applied hardfork
    pub current_hardfork_version: HardforkVersion,
    /// hardfork voted by a qualified majority
    pub next_hardfork: HardforkVersion,
    /// activation time voted for `next_hardfork`
    pub next_hardfork_time: SigmaTime,
}

impl Object for HardforkPropertyObject {
    const TABLE: &'static str = "hardfork_property";
}

/// Pending savings transfer
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SavingsWithdrawObject {
    /// sender
    pub from: AccountName,
    /// receiver
    pub to: AccountName,
    /// request id, unique per sender
    pub request_id: u32,
    /// amount held in the receiver savings
    pub amount: Asset,
    /// total of the split payment
    pub total_amount: Asset,
    /// rank of this payment in the split payment
    pub split_pay_order: u8,
    /// number of months of the split payment
    pub split_pay_month: u8,
    /// memo
    pub memo: String,
    /// maturity
    pub complete: SigmaTime,
}

impl SavingsWithdrawObject {
    /// Index by (sender, request id)
    pub const BY_FROM_RID: &'static str = "by_from_rid";

    /// Key in `BY_FROM_RID`
    pub fn key(from: &AccountName, request_id: u32) -> Vec<u8> {
        KeyBuilder::new()
            .str(from.as_str())
            .u32(request_id)
            .build()
    }
}

impl Object for SavingsWithdrawObject {
    const TABLE: &'static str = "savings_withdraw";
    const INDEXES: &'static [&'static str] = &[Self::BY_FROM_RID];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![Self::key(&self.from, self.request_id)]
    }
}

/// Pending staking withdrawal
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FundWithdrawObject {
    /// staking account
    pub from: AccountName,
    /// fund
    pub fund_name: String,
    /// request id, unique per account and fund
    pub request_id: u32,
    /// principal plus interest
    pub amount: Asset,
    /// memo
    pub memo: String,
    /// maturity
    pub complete: SigmaTime,
}

impl FundWithdrawObject {
    /// Index by (account, fund, request id)
    pub const BY_FROM_FUND_RID: &'static str = "by_from_fund_rid";

    /// Key in `BY_FROM_FUND_RID`
    pub fn key(from: &AccountName, fund_name: &str, request_id: u32) -> Vec<u8> {
        KeyBuilder::new()
            .str(from.as_str())
            .str(fund_name)
            .u32(request_id)
            .build()
    }
}

impl Object for FundWithdrawObject {
    const TABLE: &'static str = "fund_withdraw";
    const INDEXES: &'static [&'static str] = &[Self::BY_FROM_FUND_RID];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![Self::key(&self.from, &self.fund_name, self.request_id)]
    }
}

/// Interest table of a fund, by user type then staking month
pub type InterestTable = [[Option<InterestRate>; MAX_STAKING_MONTH]; MAX_USER_TYPE];

/// A fund shared by the chain
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommonFundObject {
    /// unique name
    pub name: String,
    /// balance held by the fund
    pub fund_balance: Asset,
    /// amount promised to pending withdrawals
    pub fund_withdraw_ready: Asset,
    /// interest rates, `None` when undefined
    pub percent_interest: InterestTable,
    /// last change of the interest table
    pub last_update: SigmaTime,
}

impl CommonFundObject {
    /// Key in `BY_NAME`
    pub fn key(name: &str) -> Vec<u8> {
        KeyBuilder::new().str(name).build()
    }

    /// Empty fund
    pub fn new(name: &str, last_update: SigmaTime) -> Self {
        CommonFundObject {
            name: name.to_string(),
            fund_balance: Asset::base(Amount::zero()),
            fund_withdraw_ready: Asset::base(Amount::zero()),
            percent_interest: [[None; MAX_STAKING_MONTH]; MAX_USER_TYPE],
            last_update,
        }
    }

    /// Rate for `usertype` staking for `month` months (1-based)
    pub fn interest(&self, usertype: u8, month: u8) -> Option<InterestRate> {
        let month = (month as usize).checked_sub(1)?;
        *self.percent_interest.get(usertype as usize)?.get(month)?
    }
}

impl Object for CommonFundObject {
    const TABLE: &'static str = "common_fund";
    const INDEXES: &'static [&'static str] = &[BY_NAME];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![Self::key(&self.name)]
    }
}

/// Pending owner change requested by the recovery account
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountRecoveryRequestObject {
    /// account to recover
    pub account_to_recover: AccountName,
    /// proposed owner authority
    pub new_owner_authority: Authority,
    /// expiration of the request
    pub expires: SigmaTime,
}

impl Object for AccountRecoveryRequestObject {
    const TABLE: &'static str = "account_recovery_request";
    const INDEXES: &'static [&'static str] = &[BY_ACCOUNT];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![name_key(&self.account_to_recover)]
    }
}

/// Pending change of recovery account
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChangeRecoveryAccountRequestObject {
    /// account whose recovery account changes
    pub account_to_recover: AccountName,
    /// new recovery account
    pub recovery_account: AccountName,
    /// time at which the change applies
    pub effective_on: SigmaTime,
}

impl Object for ChangeRecoveryAccountRequestObject {
    const TABLE: &'static str = "change_recovery_account_request";
    const INDEXES: &'static [&'static str] = &[BY_ACCOUNT];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![name_key(&self.account_to_recover)]
    }
}

/// Pending renunciation of voting rights
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DeclineVotingRightsRequestObject {
    /// declining account
    pub account: AccountName,
    /// time at which voting rights are lost
    pub effective_date: SigmaTime,
}

impl Object for DeclineVotingRightsRequestObject {
    const TABLE: &'static str = "decline_voting_rights_request";
    const INDEXES: &'static [&'static str] = &[BY_ACCOUNT];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![name_key(&self.account)]
    }
}

/// External authentication registered by an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AccountAuthObject {
    /// registering account
    pub account: AccountName,
    /// kind of authentication
    pub auth_type: String,
    /// token
    pub auth_token: String,
    /// registration time
    pub reg_date: SigmaTime,
}

impl AccountAuthObject {
    /// Index by (account, type)
    pub const BY_ACCOUNT_TYPE: &'static str = "by_account_type";

    /// Key in `BY_ACCOUNT_TYPE`
    pub fn key(account: &AccountName, auth_type: &str) -> Vec<u8> {
        KeyBuilder::new()
            .str(account.as_str())
            .str(auth_type)
            .build()
    }
}

impl Object for AccountAuthObject {
    const TABLE: &'static str = "account_auth";
    const INDEXES: &'static [&'static str] = &[Self::BY_ACCOUNT_TYPE];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![Self::key(&self.account, &self.auth_type)]
    }
}

/// Applied transaction kept until expiration to reject duplicates
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TransactionObject {
    /// transaction id
    pub trx_id: Hash,
    /// expiration
    pub expiration: SigmaTime,
}

impl TransactionObject {
    /// Index by id
    pub const BY_TRX_ID: &'static str = "by_trx_id";
    /// Index by (expiration, id)
    pub const BY_EXPIRATION: &'static str = "by_expiration";

    /// Key in `BY_TRX_ID`
    pub fn key(trx_id: &Hash) -> Vec<u8> {
        KeyBuilder::new().bytes(trx_id.to_bytes()).build()
    }
}

impl Object for TransactionObject {
    const TABLE: &'static str = "transaction";
    const INDEXES: &'static [&'static str] = &[Self::BY_TRX_ID, Self::BY_EXPIRATION];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![
            Self::key(&self.trx_id),
            KeyBuilder::new()
                .u32(self.expiration.to_secs())
                .bytes(self.trx_id.to_bytes())
                .build(),
        ]
    }
}

/// Applied operation, submitted or virtual
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OperationObject {
    /// enclosing transaction, zero for block-level virtual operations
    pub trx_id: Hash,
    /// block height
    pub block: u32,
    /// index of the transaction in the block
    pub trx_in_block: u32,
    /// index of the operation in the transaction
    pub op_in_trx: u16,
    /// rank among the virtual operations emitted by the same operation, 0 when submitted
    pub virtual_op: u32,
    /// block time
    pub timestamp: SigmaTime,
    /// operation
    pub op: Operation,
}

impl Object for OperationObject {
    const TABLE: &'static str = "operation";
}

/// Entry of the history of an account
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountHistoryObject {
    /// impacted account
    pub account: AccountName,
    /// position in the history of the account
    pub sequence: u32,
    /// operation
    pub op: ObjectId<OperationObject>,
}

impl AccountHistoryObject {
    /// Index by (account, sequence descending)
    pub const BY_ACCOUNT_SEQUENCE: &'static str = "by_account_sequence";
}

impl Object for AccountHistoryObject {
    const TABLE: &'static str = "account_history";
    const INDEXES: &'static [&'static str] = &[Self::BY_ACCOUNT_SEQUENCE];

    fn index_keys(&self) -> Vec<Vec<u8>> {
        vec![KeyBuilder::new()
            .str(self.account.as_str())
            .u32_desc(self.sequence)
            .build()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_models::constants::BASE_SYMBOL;
    use std::str::FromStr;

    #[test]
    fn test_vote_index_sorts_by_votes_then_name() {
        let key = PublicKey::null();
        let mut low = BobserverObject::new(AccountName::new("alpha"), SigmaTime::from_secs(0), key);
        low.votes = 1;
        let mut high = BobserverObject::new(AccountName::new("zulu"), SigmaTime::from_secs(0), key);
        high.votes = 5;
        let mut tie = BobserverObject::new(AccountName::new("bravo"), SigmaTime::from_secs(0), key);
        tie.votes = 1;
        assert!(high.vote_key() < low.vote_key());
        assert!(low.vote_key() < tie.vote_key());
    }

    #[test]
    fn test_interest_lookup_is_one_based() {
        let mut fund = CommonFundObject::new("deposit", SigmaTime::from_secs(0));
        fund.percent_interest[0][5] = Some(InterestRate::from_str("2").unwrap());
        assert_eq!(fund.interest(0, 6), InterestRate::from_str("2").ok());
        assert_eq!(fund.interest(0, 0), None);
        assert_eq!(fund.interest(2, 1), None);
        assert_eq!(fund.interest(0, 13), None);
        assert_eq!(fund.fund_balance.symbol, BASE_SYMBOL);
    }
}
