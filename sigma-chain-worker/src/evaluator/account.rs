// Copyright (c) 2024 SIGMA ENGINE

use super::ApplyContext;
use sigma_chain_exports::objects::{
    account_prefix, AccountAuthObject, AccountAuthorityObject, AccountObject,
    DeclineVotingRightsRequestObject, BY_ACCOUNT,
};
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::constants::TEMP_ACCOUNT;
use sigma_models::{
    AccountAuthOperation, AccountCreateOperation, AccountUpdateOperation, Authority,
    DeclineVotingRightsOperation,
};
use sigma_time::SigmaTime;

/// Fails unless every account referenced by `authority` exists
pub(super) fn check_authority_accounts(
    ctx: &ApplyContext<'_>,
    authority: &Authority,
) -> ChainResult<()> {
    for name in authority.account_auths.keys() {
        ctx.state.get_account(name)?;
    }
    Ok(())
}

pub(super) fn account_create(
    ctx: &mut ApplyContext<'_>,
    op: &AccountCreateOperation,
) -> ChainResult<()> {
    let now = ctx.head_time()?;
    ctx.state.get_account(&op.creator)?;
    if ctx.state.find_account(&op.new_account_name).is_some() {
        return Err(ChainError::InvalidOperation(format!(
            "account {} already exists",
            op.new_account_name
        )));
    }
    for authority in [&op.owner, &op.active, &op.posting] {
        check_authority_accounts(ctx, authority)?;
    }

    let mut account = AccountObject::new(op.new_account_name.clone(), op.memo_key, now);
    account.json_metadata = op.json_metadata.clone();
    account.recovery_account = op.creator.clone();
    ctx.state.accounts.create(account)?;
    ctx.state.account_authorities.create(AccountAuthorityObject {
        account: op.new_account_name.clone(),
        owner: op.owner.clone(),
        active: op.active.clone(),
        posting: op.posting.clone(),
        last_owner_update: SigmaTime::from_secs(0),
    })?;
    Ok(())
}

pub(super) fn account_update(
    ctx: &mut ApplyContext<'_>,
    op: &AccountUpdateOperation,
) -> ChainResult<()> {
    if op.account.as_str() == TEMP_ACCOUNT && ctx.state.has_hardfork(1)? {
        return Err(ChainError::InvalidOperation(
            "the temp account cannot be updated".to_string(),
        ));
    }
    let now = ctx.head_time()?;
    ctx.state.get_account(&op.account)?;
    let (authority_id, authority) = ctx.state.get_account_authority(&op.account)?;

    if let Some(owner) = &op.owner {
        let elapsed = now.saturating_sub(authority.last_owner_update).to_secs();
        if elapsed <= ctx.config.owner_update_limit {
            return Err(ChainError::InvalidOperation(format!(
                "owner of {} was updated {}s ago, the minimum delay is {}s",
                op.account, elapsed, ctx.config.owner_update_limit
            )));
        }
        check_authority_accounts(ctx, owner)?;
        ctx.state.update_owner_authority(&op.account, owner.clone())?;
    }
    for authority in [&op.active, &op.posting].into_iter().flatten() {
        check_authority_accounts(ctx, authority)?;
    }
    if op.active.is_some() || op.posting.is_some() {
        ctx.state.account_authorities.modify(authority_id, |authority| {
            if let Some(active) = &op.active {
                authority.active = active.clone();
            }
            if let Some(posting) = &op.posting {
                authority.posting = posting.clone();
            }
        })?;
    }

    ctx.state.modify_account(&op.account, |account| {
        if !op.memo_key.is_null() {
            account.memo_key = op.memo_key;
        }
        if !op.json_metadata.is_empty() {
            account.json_metadata = op.json_metadata.clone();
        }
        account.last_account_update = now;
    })
}

pub(super) fn decline_voting_rights(
    ctx: &mut ApplyContext<'_>,
    op: &DeclineVotingRightsOperation,
) -> ChainResult<()> {
    let now = ctx.head_time()?;
    ctx.state.get_account(&op.account)?;
    let request = ctx
        .state
        .decline_voting_requests
        .find_by(BY_ACCOUNT, &account_prefix(&op.account))
        .map(|(id, _)| id);
    match (op.decline, request) {
        (true, None) => {
            ctx.state
                .decline_voting_requests
                .create(DeclineVotingRightsRequestObject {
                    account: op.account.clone(),
                    effective_date: now.saturating_add_secs(ctx.config.owner_auth_recovery_period),
                })?;
        }
        (true, Some(_)) => {
            return Err(ChainError::InvalidOperation(format!(
                "{} already requested to decline its voting rights",
                op.account
            )));
        }
        (false, Some(id)) => {
            ctx.state.decline_voting_requests.remove(id)?;
        }
        (false, None) => {
            return Err(ChainError::InvalidOperation(format!(
                "{} has no pending request to decline its voting rights",
                op.account
            )));
        }
    }
    Ok(())
}

pub(super) fn account_auth(ctx: &mut ApplyContext<'_>, op: &AccountAuthOperation) -> ChainResult<()> {
    let now = ctx.head_time()?;
    ctx.state.get_account(&op.account)?;
    let key = AccountAuthObject::key(&op.account, &op.auth_type);
    match ctx
        .state
        .account_auths
        .find_by(AccountAuthObject::BY_ACCOUNT_TYPE, &key)
        .map(|(id, _)| id)
    {
        Some(id) => ctx.state.account_auths.modify(id, |auth| {
            auth.auth_token = op.auth_token.clone();
            auth.reg_date = now;
        })?,
        None => {
            ctx.state.account_auths.create(AccountAuthObject {
                account: op.account.clone(),
                auth_type: op.auth_type.clone(),
                auth_token: op.auth_token.clone(),
                reg_date: now,
            })?;
        }
    }
    Ok(())
}
