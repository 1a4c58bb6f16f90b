// Copyright (c) 2024 SIGMA ENGINE

use super::ApplyContext;
use sigma_chain_exports::objects::FundWithdrawObject;
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::constants::STAKING_MONTH_PERIOD;
use sigma_models::{
    AccountName, Asset, ConclusionStakingOperation, FillStakingFundOperation, InterestRate,
    ModelsError, Operation, ReturnStakingFundOperation, SetFundInterestOperation,
    StakingFundOperation, TransferFundOperation,
};
use std::str::FromStr;

pub(super) fn staking_fund(ctx: &mut ApplyContext<'_>, op: &StakingFundOperation) -> ChainResult<()> {
    let now = ctx.head_time()?;
    let (_, fund) = ctx.state.get_common_fund(&op.fund_name)?;
    let rate = fund.interest(op.usertype, op.month).ok_or_else(|| {
        ChainError::InvalidOperation(format!(
            "fund {} has no interest for user type {} over {} months",
            op.fund_name, op.usertype, op.month
        ))
    })?;
    let interest = rate
        .interest_on(op.amount.amount)
        .ok_or(ModelsError::AmountOverflowError)?;
    let total = op
        .amount
        .amount
        .checked_add(interest)
        .ok_or(ModelsError::AmountOverflowError)?;
    let record = Asset::new(total, op.amount.symbol);

    ctx.state.sub_balance(&op.from, &op.amount)?;
    ctx.state.add_fund_balance(&op.fund_name, &op.amount)?;
    ctx.state.fund_withdraws.create(FundWithdrawObject {
        from: op.from.clone(),
        fund_name: op.fund_name.clone(),
        request_id: op.request_id,
        amount: record,
        memo: op.memo.clone(),
        complete: now.saturating_add_secs(STAKING_MONTH_PERIOD.saturating_mul(op.month as u32)),
    })?;
    ctx.state.add_fund_withdraw_ready(&op.fund_name, &record)
}

/// Pays a staking withdrawal out of its fund and emits `fill_staking_fund`
fn pay_out(
    ctx: &mut ApplyContext<'_>,
    to: &AccountName,
    fund_name: &str,
    request_id: u32,
    require_maturity: bool,
) -> ChainResult<()> {
    let now = ctx.head_time()?;
    let (id, withdraw) = ctx.state.get_fund_withdraw(to, fund_name, request_id)?;
    if require_maturity && withdraw.complete > now {
        return Err(ChainError::InvalidOperation(format!(
            "staking {} of {} matures at {}",
            request_id, to, withdraw.complete
        )));
    }
    let withdraw = ctx.state.fund_withdraws.remove(id)?;
    ctx.state.sub_fund_balance(fund_name, &withdraw.amount)?;
    ctx.state.sub_fund_withdraw_ready(fund_name, &withdraw.amount)?;
    ctx.state.add_balance(to, &withdraw.amount)?;
    ctx.push_virtual_operation(Operation::FillStakingFund(FillStakingFundOperation {
        from: withdraw.from,
        fund_name: withdraw.fund_name,
        amount: withdraw.amount,
        request_id: withdraw.request_id,
        memo: withdraw.memo,
    }))
}

pub(super) fn conclusion_staking(
    ctx: &mut ApplyContext<'_>,
    op: &ConclusionStakingOperation,
) -> ChainResult<()> {
    ctx.check_root(&op.root)?;
    pay_out(ctx, &op.from, &op.fund_name, op.request_id, true)
}

pub(super) fn return_staking_fund(
    ctx: &mut ApplyContext<'_>,
    op: &ReturnStakingFundOperation,
) -> ChainResult<()> {
    ctx.check_root(&op.root)?;
    pay_out(ctx, &op.to, &op.fund_name, op.request_id, false)
}

pub(super) fn transfer_fund(ctx: &mut ApplyContext<'_>, op: &TransferFundOperation) -> ChainResult<()> {
    ctx.state.sub_balance(&op.from, &op.amount)?;
    ctx.state.add_fund_balance(&op.fund_name, &op.amount)
}

pub(super) fn set_fund_interest(
    ctx: &mut ApplyContext<'_>,
    op: &SetFundInterestOperation,
) -> ChainResult<()> {
    let now = ctx.head_time()?;
    ctx.check_root(&op.root)?;
    let rate = InterestRate::from_str(&op.percent_interest)
        .map_err(|err| ChainError::InvalidOperation(format!("invalid interest: {}", err)))?;
    let (id, _) = ctx.state.get_common_fund(&op.fund_name)?;
    let row = op.usertype as usize;
    let column = (op.month as usize).checked_sub(1).ok_or_else(|| {
        ChainError::InvalidOperation(format!("invalid staking month {}", op.month))
    })?;
    let mut in_range = false;
    ctx.state.common_funds.modify(id, |fund| {
        if let Some(cell) = fund
            .percent_interest
            .get_mut(row)
            .and_then(|months| months.get_mut(column))
        {
            *cell = Some(rate);
            fund.last_update = now;
            in_range = true;
        }
    })?;
    if !in_range {
        return Err(ChainError::InvalidOperation(format!(
            "no interest cell for user type {} over {} months",
            op.usertype, op.month
        )));
    }
    Ok(())
}
