// Copyright (c) 2024 SIGMA ENGINE

//! Tables of the chain state and the lookups shared by every evaluator.

mod balances;

use sigma_chain_exports::objects::*;
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_db::{undoable_state, ObjectId, Table};
use sigma_models::{AccountName, BlockId};
use sigma_time::SigmaTime;

/// Singletons are the first and only row of their table
fn singleton<T>() -> ObjectId<T> {
    ObjectId::new(0)
}

/// Every table of the chain. All tables open, squash and revert undo
/// revisions together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainState {
    /// accounts
    pub accounts: Table<AccountObject>,
    /// authorities of the accounts
    pub account_authorities: Table<AccountAuthorityObject>,
    /// replaced owner authorities
    pub owner_history: Table<OwnerAuthorityHistoryObject>,
    /// producers
    pub bobservers: Table<BobserverObject>,
    /// producer votes
    pub bobserver_votes: Table<BobserverVoteObject>,
    /// producer schedule singleton
    pub schedule: Table<BobserverScheduleObject>,
    /// dynamic global properties singleton
    pub global_properties: Table<DynamicGlobalPropertyObject>,
    /// hardfork property singleton
    pub hardfork_properties: Table<HardforkPropertyObject>,
    /// pending savings transfers
    pub savings_withdraws: Table<SavingsWithdrawObject>,
    /// pending staking withdrawals
    pub fund_withdraws: Table<FundWithdrawObject>,
    /// common funds
    pub common_funds: Table<CommonFundObject>,
    /// account recovery requests
    pub recovery_requests: Table<AccountRecoveryRequestObject>,
    /// recovery account changes
    pub change_recovery_requests: Table<ChangeRecoveryAccountRequestObject>,
    /// voting rights renunciations
    pub decline_voting_requests: Table<DeclineVotingRightsRequestObject>,
    /// external authentications
    pub account_auths: Table<AccountAuthObject>,
    /// applied transactions, for duplicate detection
    pub transactions: Table<TransactionObject>,
    /// applied operations
    pub operations: Table<OperationObject>,
    /// per-account operation history
    pub account_history: Table<AccountHistoryObject>,
}

undoable_state!(ChainState {
    accounts,
    account_authorities,
    owner_history,
    bobservers,
    bobserver_votes,
    schedule,
    global_properties,
    hardfork_properties,
    savings_withdraws,
    fund_withdraws,
    common_funds,
    recovery_requests,
    change_recovery_requests,
    decline_voting_requests,
    account_auths,
    transactions,
    operations,
    account_history,
});

impl ChainState {
    /// Dynamic global properties
    pub fn dynamic_global_properties(&self) -> ChainResult<&DynamicGlobalPropertyObject> {
        Ok(self.global_properties.get(singleton())?)
    }

    /// Applies `f` to the dynamic global properties
    pub fn modify_dynamic_global_properties(
        &mut self,
        f: impl FnOnce(&mut DynamicGlobalPropertyObject),
    ) -> ChainResult<()> {
        Ok(self.global_properties.modify(singleton(), f)?)
    }

    /// Producer schedule
    pub fn bobserver_schedule(&self) -> ChainResult<&BobserverScheduleObject> {
        Ok(self.schedule.get(singleton())?)
    }

    /// Applies `f` to the producer schedule
    pub fn modify_bobserver_schedule(
        &mut self,
        f: impl FnOnce(&mut BobserverScheduleObject),
    ) -> ChainResult<()> {
        Ok(self.schedule.modify(singleton(), f)?)
    }

    /// Hardfork property
    pub fn hardfork_property(&self) -> ChainResult<&HardforkPropertyObject> {
        Ok(self.hardfork_properties.get(singleton())?)
    }

    /// Applies `f` to the hardfork property
    pub fn modify_hardfork_property(
        &mut self,
        f: impl FnOnce(&mut HardforkPropertyObject),
    ) -> ChainResult<()> {
        Ok(self.hardfork_properties.modify(singleton(), f)?)
    }

    /// Time of the head block
    pub fn head_block_time(&self) -> ChainResult<SigmaTime> {
        Ok(self.dynamic_global_properties()?.time)
    }

    /// Height of the head block
    pub fn head_block_num(&self) -> ChainResult<u32> {
        Ok(self.dynamic_global_properties()?.head_block_number)
    }

    /// Id of the head block
    pub fn head_block_id(&self) -> ChainResult<BlockId> {
        Ok(self.dynamic_global_properties()?.head_block_id)
    }

    /// Whether hardfork `hardfork` was applied
    pub fn has_hardfork(&self, hardfork: u32) -> ChainResult<bool> {
        Ok(self.hardfork_property()?.processed_hardforks.len() > hardfork as usize)
    }

    /// Account by name
    pub fn find_account(&self, name: &AccountName) -> Option<(ObjectId<AccountObject>, &AccountObject)> {
        self.accounts.find_by(BY_NAME, &account_prefix(name))
    }

    /// Account by name, failing when it does not exist
    pub fn get_account(&self, name: &AccountName) -> ChainResult<(ObjectId<AccountObject>, &AccountObject)> {
        self.find_account(name)
            .ok_or_else(|| ChainError::UnknownAccount(name.clone()))
    }

    /// Applies `f` to an account
    pub fn modify_account(
        &mut self,
        name: &AccountName,
        f: impl FnOnce(&mut AccountObject),
    ) -> ChainResult<()> {
        let (id, _) = self.get_account(name)?;
        Ok(self.accounts.modify(id, f)?)
    }

    /// Authorities of an account
    pub fn get_account_authority(
        &self,
        name: &AccountName,
    ) -> ChainResult<(ObjectId<AccountAuthorityObject>, &AccountAuthorityObject)> {
        self.account_authorities
            .find_by(BY_ACCOUNT, &account_prefix(name))
            .ok_or_else(|| ChainError::UnknownAccount(name.clone()))
    }

    /// Producer by name
    pub fn find_bobserver(&self, name: &AccountName) -> Option<(ObjectId<BobserverObject>, &BobserverObject)> {
        self.bobservers.find_by(BY_NAME, &account_prefix(name))
    }

    /// Producer by name, failing when it does not exist
    pub fn get_bobserver(&self, name: &AccountName) -> ChainResult<(ObjectId<BobserverObject>, &BobserverObject)> {
        self.find_bobserver(name)
            .ok_or_else(|| ChainError::UnknownProducer(name.clone()))
    }

    /// Applies `f` to a producer
    pub fn modify_bobserver(
        &mut self,
        name: &AccountName,
        f: impl FnOnce(&mut BobserverObject),
    ) -> ChainResult<()> {
        let (id, _) = self.get_bobserver(name)?;
        Ok(self.bobservers.modify(id, f)?)
    }

    /// Common fund by name
    pub fn get_common_fund(&self, name: &str) -> ChainResult<(ObjectId<CommonFundObject>, &CommonFundObject)> {
        self.common_funds
            .find_by(BY_NAME, &CommonFundObject::key(name))
            .ok_or_else(|| ChainError::UnknownFund(name.to_string()))
    }

    /// Pending savings transfer of `from`
    pub fn get_savings_withdraw(
        &self,
        from: &AccountName,
        request_id: u32,
    ) -> ChainResult<(ObjectId<SavingsWithdrawObject>, &SavingsWithdrawObject)> {
        self.savings_withdraws
            .find_by(
                SavingsWithdrawObject::BY_FROM_RID,
                &SavingsWithdrawObject::key(from, request_id),
            )
            .ok_or_else(|| ChainError::UnknownWithdraw {
                account: from.clone(),
                request_id,
            })
    }

    /// Pending staking withdrawal of `from` in `fund_name`
    pub fn get_fund_withdraw(
        &self,
        from: &AccountName,
        fund_name: &str,
        request_id: u32,
    ) -> ChainResult<(ObjectId<FundWithdrawObject>, &FundWithdrawObject)> {
        self.fund_withdraws
            .find_by(
                FundWithdrawObject::BY_FROM_FUND_RID,
                &FundWithdrawObject::key(from, fund_name, request_id),
            )
            .ok_or_else(|| ChainError::UnknownWithdraw {
                account: from.clone(),
                request_id,
            })
    }

    /// Producer with the most votes, the first by name on ties
    pub fn top_voted_bobserver(&self) -> ChainResult<Option<&BobserverObject>> {
        Ok(self
            .bobservers
            .iter_by(BobserverObject::BY_VOTE_NAME)?
            .next()
            .map(|(_, bobserver)| bobserver))
    }
}
