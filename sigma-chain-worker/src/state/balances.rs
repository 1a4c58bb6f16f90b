// Copyright (c) 2024 SIGMA ENGINE

use super::ChainState;
use sigma_chain_exports::objects::{
    account_prefix, BobserverVoteObject, OwnerAuthorityHistoryObject,
};
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::{AccountName, Amount, Asset, AssetSymbol, Authority, ModelsError};
use std::collections::BTreeMap;

fn credit(current: Amount, amount: Amount) -> ChainResult<Amount> {
    Ok(current
        .checked_add(amount)
        .ok_or(ModelsError::AmountOverflowError)?)
}

impl ChainState {
    /// Credits the liquid balance of `name`
    pub fn add_balance(&mut self, name: &AccountName, delta: &Asset) -> ChainResult<()> {
        let (id, account) = self.get_account(name)?;
        let updated = credit(account.balance(delta.symbol), delta.amount)?;
        self.accounts.modify(id, |account| {
            account.balances.insert(delta.symbol, updated);
        })?;
        Ok(())
    }

    /// Debits the liquid balance of `name`, failing when it is too low
    pub fn sub_balance(&mut self, name: &AccountName, delta: &Asset) -> ChainResult<()> {
        let (id, account) = self.get_account(name)?;
        let available = account.balance(delta.symbol);
        let updated = available
            .checked_sub(delta.amount)
            .ok_or_else(|| ChainError::InsufficientBalance {
                account: name.clone(),
                required: delta.to_string(),
                available: Asset::new(available, delta.symbol).to_string(),
            })?;
        self.accounts.modify(id, |account| {
            account.balances.insert(delta.symbol, updated);
        })?;
        Ok(())
    }

    /// Credits the savings balance of `name`
    pub fn add_savings_balance(&mut self, name: &AccountName, delta: &Asset) -> ChainResult<()> {
        let (id, account) = self.get_account(name)?;
        let updated = credit(account.savings_balance(delta.symbol), delta.amount)?;
        self.accounts.modify(id, |account| {
            account.savings_balances.insert(delta.symbol, updated);
        })?;
        Ok(())
    }

    /// Debits the savings balance of `name`, failing when it is too low
    pub fn sub_savings_balance(&mut self, name: &AccountName, delta: &Asset) -> ChainResult<()> {
        let (id, account) = self.get_account(name)?;
        let available = account.savings_balance(delta.symbol);
        let updated = available
            .checked_sub(delta.amount)
            .ok_or_else(|| ChainError::InsufficientBalance {
                account: name.clone(),
                required: delta.to_string(),
                available: Asset::new(available, delta.symbol).to_string(),
            })?;
        self.accounts.modify(id, |account| {
            account.savings_balances.insert(delta.symbol, updated);
        })?;
        Ok(())
    }

    /// Credits a fund
    pub fn add_fund_balance(&mut self, fund_name: &str, delta: &Asset) -> ChainResult<()> {
        let (id, fund) = self.get_common_fund(fund_name)?;
        let updated = credit(fund.fund_balance.amount, delta.amount)?;
        self.common_funds
            .modify(id, |fund| fund.fund_balance.amount = updated)?;
        Ok(())
    }

    /// Debits a fund, failing when it is too low
    pub fn sub_fund_balance(&mut self, fund_name: &str, delta: &Asset) -> ChainResult<()> {
        let (id, fund) = self.get_common_fund(fund_name)?;
        let updated = fund
            .fund_balance
            .amount
            .checked_sub(delta.amount)
            .ok_or_else(|| ChainError::InsufficientFund {
                fund: fund_name.to_string(),
                required: delta.to_string(),
                available: fund.fund_balance.to_string(),
            })?;
        self.common_funds
            .modify(id, |fund| fund.fund_balance.amount = updated)?;
        Ok(())
    }

    /// Adds to the amount a fund owes to pending withdrawals
    pub fn add_fund_withdraw_ready(&mut self, fund_name: &str, delta: &Asset) -> ChainResult<()> {
        let (id, fund) = self.get_common_fund(fund_name)?;
        let updated = credit(fund.fund_withdraw_ready.amount, delta.amount)?;
        self.common_funds
            .modify(id, |fund| fund.fund_withdraw_ready.amount = updated)?;
        Ok(())
    }

    /// Removes a settled withdrawal from the amount a fund owes
    pub fn sub_fund_withdraw_ready(&mut self, fund_name: &str, delta: &Asset) -> ChainResult<()> {
        let (id, fund) = self.get_common_fund(fund_name)?;
        let updated = fund
            .fund_withdraw_ready
            .amount
            .checked_sub(delta.amount)
            .ok_or_else(|| ChainError::InsufficientFund {
                fund: fund_name.to_string(),
                required: delta.to_string(),
                available: fund.fund_withdraw_ready.to_string(),
            })?;
        self.common_funds
            .modify(id, |fund| fund.fund_withdraw_ready.amount = updated)?;
        Ok(())
    }

    /// Increases the supply of an asset
    pub fn add_supply(&mut self, delta: &Asset) -> ChainResult<()> {
        let updated = credit(
            self.dynamic_global_properties()?.supply(delta.symbol),
            delta.amount,
        )?;
        self.modify_dynamic_global_properties(|dgp| {
            dgp.current_supply.insert(delta.symbol, updated);
        })
    }

    /// Decreases the supply of an asset
    pub fn sub_supply(&mut self, delta: &Asset) -> ChainResult<()> {
        let current = self.dynamic_global_properties()?.supply(delta.symbol);
        let updated = current
            .checked_sub(delta.amount)
            .ok_or_else(|| {
                ChainError::InvariantViolation(format!(
                    "supply {} cannot decrease by {}",
                    Asset::new(current, delta.symbol),
                    delta
                ))
            })?;
        self.modify_dynamic_global_properties(|dgp| {
            dgp.current_supply.insert(delta.symbol, updated);
        })
    }

    /// Replaces the owner authority of `name`, keeping the previous one in
    /// the owner history
    pub fn update_owner_authority(
        &mut self,
        name: &AccountName,
        owner: Authority,
    ) -> ChainResult<()> {
        let now = self.head_block_time()?;
        let (id, authority) = self.get_account_authority(name)?;
        let previous = authority.owner.clone();
        let sequence = self.owner_history.next_id().to_raw();
        self.owner_history.create(OwnerAuthorityHistoryObject {
            account: name.clone(),
            previous_owner_authority: previous,
            last_valid_time: now,
            sequence,
        })?;
        self.account_authorities.modify(id, |authority| {
            authority.owner = owner;
            authority.last_owner_update = now;
        })?;
        Ok(())
    }

    /// Changes the vote weight of a producer
    pub fn adjust_bobserver_vote(&mut self, bobserver: &AccountName, delta: i64) -> ChainResult<()> {
        self.modify_bobserver(bobserver, |bobserver| {
            bobserver.votes = bobserver.votes.saturating_add_signed(delta);
        })
    }

    /// Withdraws every vote cast by `account`
    pub fn clear_bobserver_votes(&mut self, account: &AccountName) -> ChainResult<()> {
        let prefix = account_prefix(account);
        let votes: Vec<_> = self
            .bobserver_votes
            .range_by(BobserverVoteObject::BY_ACCOUNT_BOBSERVER, &prefix)?
            .map(|(id, vote)| (id, vote.bobserver.clone()))
            .collect();
        for (id, bobserver) in votes {
            self.adjust_bobserver_vote(&bobserver, -1)?;
            self.bobserver_votes.remove(id)?;
        }
        self.modify_account(account, |account| account.bobservers_voted_for = 0)
    }

    /// Checks that the balances of every asset add up to its supply
    pub fn validate_invariants(&self) -> ChainResult<()> {
        let mut totals: BTreeMap<AssetSymbol, Amount> = BTreeMap::new();
        let holdings = self
            .accounts
            .iter()
            .flat_map(|(_, account)| account.balances.iter().chain(&account.savings_balances))
            .map(|(symbol, amount)| (*symbol, *amount))
            .chain(
                self.common_funds
                    .iter()
                    .map(|(_, fund)| (fund.fund_balance.symbol, fund.fund_balance.amount)),
            );
        for (symbol, amount) in holdings {
            let total = totals.entry(symbol).or_default();
            *total = credit(*total, amount)?;
        }
        let dgp = self.dynamic_global_properties()?;
        for symbol in totals.keys().chain(dgp.current_supply.keys()) {
            let held = totals.get(symbol).copied().unwrap_or_default();
            let supply = dgp.supply(*symbol);
            if held != supply {
                return Err(ChainError::InvariantViolation(format!(
                    "{} held but supply is {}",
                    Asset::new(held, *symbol),
                    Asset::new(supply, *symbol)
                )));
            }
        }
        Ok(())
    }
}
