// Copyright (c) 2024 SIGMA ENGINE

use super::ApplyContext;
use sigma_chain_exports::objects::BobserverObject;
use sigma_chain_exports::ChainResult;
use sigma_models::{BobserverUpdateOperation, ExceptBobserverOperation, UpdateBproducerOperation};

pub(super) fn bobserver_update(
    ctx: &mut ApplyContext<'_>,
    op: &BobserverUpdateOperation,
) -> ChainResult<()> {
    let now = ctx.head_time()?;
    ctx.check_root(&op.root)?;
    ctx.state.get_account(&op.owner)?;
    if ctx.state.find_bobserver(&op.owner).is_some() {
        return ctx.state.modify_bobserver(&op.owner, |bobserver| {
            bobserver.url = op.url.clone();
            bobserver.signing_key = op.block_signing_key;
            bobserver.bp_owner = op.root.clone();
        });
    }
    let mut bobserver = BobserverObject::new(op.owner.clone(), now, op.block_signing_key);
    bobserver.url = op.url.clone();
    bobserver.bp_owner = op.root.clone();
    ctx.state.bobservers.create(bobserver)?;
    Ok(())
}

pub(super) fn update_bproducer(
    ctx: &mut ApplyContext<'_>,
    op: &UpdateBproducerOperation,
) -> ChainResult<()> {
    ctx.check_root(&op.root)?;
    ctx.state
        .modify_bobserver(&op.bobserver, |bobserver| bobserver.is_bproducer = op.approve)
}

pub(super) fn except_bobserver(
    ctx: &mut ApplyContext<'_>,
    op: &ExceptBobserverOperation,
) -> ChainResult<()> {
    ctx.check_root(&op.root)?;
    ctx.state
        .modify_bobserver(&op.bobserver, |bobserver| bobserver.is_excepted = true)
}
