// Copyright (c) 2024 SIGMA ENGINE

use super::ApplyContext;
use sigma_chain_exports::objects::SavingsWithdrawObject;
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::{
    BurnOperation, CancelTransferSavingsOperation, ConclusionTransferSavingsOperation,
    FillTransferSavingsOperation, Operation, PrintOperation, TransferOperation,
    TransferSavingsOperation,
};

pub(super) fn transfer(ctx: &mut ApplyContext<'_>, op: &TransferOperation) -> ChainResult<()> {
    ctx.state.get_account(&op.to)?;
    ctx.state.sub_balance(&op.from, &op.amount)?;
    ctx.state.add_balance(&op.to, &op.amount)
}

pub(super) fn print(ctx: &mut ApplyContext<'_>, op: &PrintOperation) -> ChainResult<()> {
    ctx.check_root(&op.root)?;
    ctx.state.add_balance(&op.account, &op.amount)?;
    ctx.state.add_supply(&op.amount)
}

pub(super) fn burn(ctx: &mut ApplyContext<'_>, op: &BurnOperation) -> ChainResult<()> {
    ctx.check_root(&op.root)?;
    ctx.state.sub_balance(&op.account, &op.amount)?;
    ctx.state.sub_supply(&op.amount)
}

pub(super) fn transfer_savings(
    ctx: &mut ApplyContext<'_>,
    op: &TransferSavingsOperation,
) -> ChainResult<()> {
    ctx.state.get_account(&op.to)?;
    if op.complete <= ctx.head_time()? {
        return Err(ChainError::InvalidOperation(format!(
            "savings transfer {} of {} completes in the past",
            op.request_id, op.from
        )));
    }
    ctx.state.sub_balance(&op.from, &op.amount)?;
    ctx.state.add_savings_balance(&op.to, &op.amount)?;
    ctx.state.savings_withdraws.create(SavingsWithdrawObject {
        from: op.from.clone(),
        to: op.to.clone(),
        request_id: op.request_id,
        amount: op.amount,
        total_amount: op.amount,
        split_pay_order: op.split_pay_order,
        split_pay_month: op.split_pay_month,
        memo: op.memo.clone(),
        complete: op.complete,
    })?;
    Ok(())
}

pub(super) fn cancel_transfer_savings(
    ctx: &mut ApplyContext<'_>,
    op: &CancelTransferSavingsOperation,
) -> ChainResult<()> {
    let (id, withdraw) = ctx.state.get_savings_withdraw(&op.from, op.request_id)?;
    if withdraw.to != op.to {
        return Err(ChainError::InvalidOperation(format!(
            "savings transfer {} of {} is not addressed to {}",
            op.request_id, op.from, op.to
        )));
    }
    if op.amount.symbol != withdraw.amount.symbol || op.amount.amount < withdraw.amount.amount {
        return Err(ChainError::InvalidOperation(format!(
            "cancelling {} does not cover the pending {}",
            op.amount, withdraw.amount
        )));
    }
    let amount = withdraw.amount;
    ctx.state.sub_savings_balance(&op.to, &amount)?;
    ctx.state.add_balance(&op.from, &amount)?;
    ctx.state.savings_withdraws.remove(id)?;
    Ok(())
}

pub(super) fn conclusion_transfer_savings(
    ctx: &mut ApplyContext<'_>,
    op: &ConclusionTransferSavingsOperation,
) -> ChainResult<()> {
    let now = ctx.head_time()?;
    let (id, withdraw) = ctx.state.get_savings_withdraw(&op.from, op.request_id)?;
    if withdraw.to != op.to {
        return Err(ChainError::InvalidOperation(format!(
            "savings transfer {} of {} is not addressed to {}",
            op.request_id, op.from, op.to
        )));
    }
    if withdraw.complete > now {
        return Err(ChainError::InvalidOperation(format!(
            "savings transfer {} of {} matures at {}",
            op.request_id, op.from, withdraw.complete
        )));
    }
    let withdraw = withdraw.clone();
    ctx.state.sub_savings_balance(&withdraw.to, &withdraw.amount)?;
    ctx.state.add_balance(&withdraw.to, &withdraw.amount)?;
    ctx.state.savings_withdraws.remove(id)?;
    ctx.push_virtual_operation(Operation::FillTransferSavings(FillTransferSavingsOperation {
        from: withdraw.from,
        to: withdraw.to,
        amount: withdraw.amount,
        total_amount: withdraw.total_amount,
        split_pay_order: withdraw.split_pay_order,
        split_pay_month: withdraw.split_pay_month,
        request_id: withdraw.request_id,
        memo: withdraw.memo,
    }))
}
