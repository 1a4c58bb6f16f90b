// Copyright (c) 2024 SIGMA ENGINE

use super::account::check_authority_accounts;
use super::ApplyContext;
use sigma_chain_exports::objects::{
    account_prefix, AccountRecoveryRequestObject, ChangeRecoveryAccountRequestObject,
    OwnerAuthorityHistoryObject, BY_ACCOUNT,
};
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::{
    ChangeRecoveryAccountOperation, RecoverAccountOperation, RequestAccountRecoveryOperation,
};

pub(super) fn request_account_recovery(
    ctx: &mut ApplyContext<'_>,
    op: &RequestAccountRecoveryOperation,
) -> ChainResult<()> {
    let now = ctx.head_time()?;
    let (_, account) = ctx.state.get_account(&op.account_to_recover)?;
    if account.recovery_account.is_empty() {
        let top = ctx
            .state
            .top_voted_bobserver()?
            .map(|bobserver| bobserver.account.clone());
        if top.as_ref() != Some(&op.recovery_account) {
            return Err(ChainError::InvalidOperation(format!(
                "only the top voted bobserver may recover {}",
                op.account_to_recover
            )));
        }
    } else if account.recovery_account != op.recovery_account {
        return Err(ChainError::InvalidOperation(format!(
            "{} is not the recovery account of {}",
            op.recovery_account, op.account_to_recover
        )));
    }

    let expires = now.saturating_add_secs(ctx.config.account_recovery_request_expiration_period);
    let request = ctx
        .state
        .recovery_requests
        .find_by(BY_ACCOUNT, &account_prefix(&op.account_to_recover))
        .map(|(id, _)| id);
    let authority = &op.new_owner_authority;
    match request {
        None => {
            if authority.is_impossible() || authority.weight_threshold == 0 {
                return Err(ChainError::InvalidOperation(
                    "cannot recover using an impossible or open authority".to_string(),
                ));
            }
            check_authority_accounts(ctx, authority)?;
            ctx.state.recovery_requests.create(AccountRecoveryRequestObject {
                account_to_recover: op.account_to_recover.clone(),
                new_owner_authority: authority.clone(),
                expires,
            })?;
        }
        Some(id) if authority.weight_threshold == 0 => {
            ctx.state.recovery_requests.remove(id)?;
        }
        Some(id) => {
            if authority.is_impossible() {
                return Err(ChainError::InvalidOperation(
                    "cannot recover using an impossible authority".to_string(),
                ));
            }
            check_authority_accounts(ctx, authority)?;
            ctx.state.recovery_requests.modify(id, |request| {
                request.new_owner_authority = authority.clone();
                request.expires = expires;
            })?;
        }
    }
    Ok(())
}

pub(super) fn recover_account(
    ctx: &mut ApplyContext<'_>,
    op: &RecoverAccountOperation,
) -> ChainResult<()> {
    let now = ctx.head_time()?;
    let (_, account) = ctx.state.get_account(&op.account_to_recover)?;
    let elapsed = now.saturating_sub(account.last_account_recovery).to_secs();
    if elapsed <= ctx.config.owner_update_limit {
        return Err(ChainError::InvalidOperation(format!(
            "{} was recovered {}s ago",
            op.account_to_recover, elapsed
        )));
    }

    let prefix = account_prefix(&op.account_to_recover);
    let (request_id, request) = ctx
        .state
        .recovery_requests
        .find_by(BY_ACCOUNT, &prefix)
        .ok_or_else(|| ChainError::UnknownRecoveryRequest(op.account_to_recover.clone()))?;
    if request.expires <= now {
        return Err(ChainError::UnknownRecoveryRequest(op.account_to_recover.clone()));
    }
    if request.new_owner_authority != op.new_owner_authority {
        return Err(ChainError::InvalidOperation(
            "new owner authority does not match the recovery request".to_string(),
        ));
    }
    let found = ctx
        .state
        .owner_history
        .range_by(OwnerAuthorityHistoryObject::BY_ACCOUNT_SEQUENCE, &prefix)?
        .any(|(_, entry)| entry.previous_owner_authority == op.recent_owner_authority);
    if !found {
        return Err(ChainError::InvalidOperation(
            "recent owner authority not found in the owner history".to_string(),
        ));
    }

    ctx.state.recovery_requests.remove(request_id)?;
    ctx.state
        .update_owner_authority(&op.account_to_recover, op.new_owner_authority.clone())?;
    ctx.state
        .modify_account(&op.account_to_recover, |account| {
            account.last_account_recovery = now
        })
}

pub(super) fn change_recovery_account(
    ctx: &mut ApplyContext<'_>,
    op: &ChangeRecoveryAccountOperation,
) -> ChainResult<()> {
    let now = ctx.head_time()?;
    ctx.state.get_account(&op.new_recovery_account)?;
    ctx.state.get_account(&op.account_to_recover)?;

    let prefix = account_prefix(&op.account_to_recover);
    let mut request = ctx
        .state
        .change_recovery_requests
        .find_by(BY_ACCOUNT, &prefix)
        .map(|(id, request)| (id, request.clone()));
    if let Some((id, matured)) = request.clone().filter(|(_, r)| r.effective_on <= now) {
        ctx.state.modify_account(&op.account_to_recover, |account| {
            account.recovery_account = matured.recovery_account
        })?;
        ctx.state.change_recovery_requests.remove(id)?;
        request = None;
    }

    let effective_on = now.saturating_add_secs(ctx.config.owner_auth_recovery_period);
    let (_, account) = ctx.state.get_account(&op.account_to_recover)?;
    let current = account.recovery_account.clone();
    match request {
        None => {
            ctx.state
                .change_recovery_requests
                .create(ChangeRecoveryAccountRequestObject {
                    account_to_recover: op.account_to_recover.clone(),
                    recovery_account: op.new_recovery_account.clone(),
                    effective_on,
                })?;
        }
        Some((id, _)) if current != op.new_recovery_account => {
            ctx.state.change_recovery_requests.modify(id, |request| {
                request.recovery_account = op.new_recovery_account.clone();
                request.effective_on = effective_on;
            })?;
        }
        Some((id, _)) => {
            ctx.state.change_recovery_requests.remove(id)?;
        }
    }
    Ok(())
}
