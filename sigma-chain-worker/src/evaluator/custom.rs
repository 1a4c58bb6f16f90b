// Copyright (c) 2024 SIGMA ENGINE

use super::ApplyContext;
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_models::{
    CustomBinaryOperation, CustomJsonDappOperation, CustomJsonOperation, CustomOperation,
    Operation,
};
use tracing::warn;

fn check_payload_size(ctx: &ApplyContext<'_>, size: usize) -> ChainResult<()> {
    if ctx.is_producing() && size > ctx.config.max_custom_payload_size {
        return Err(ChainError::InvalidOperation(format!(
            "custom payload of {} bytes exceeds {} bytes",
            size, ctx.config.max_custom_payload_size
        )));
    }
    Ok(())
}

/// Hands the operation to the interpreter registered under `id`.
/// Interpreter failures only reject the operation while producing.
fn interpret(ctx: &mut ApplyContext<'_>, id: &str, outer: &Operation) -> ChainResult<()> {
    let Some(interpreter) = ctx.interpreter(id) else {
        return Ok(());
    };
    match interpreter.apply(ctx, outer) {
        Ok(()) => Ok(()),
        Err(err) if ctx.is_producing() => Err(err),
        Err(err) => {
            warn!("custom operation {} ignored: {}", id, err);
            Ok(())
        }
    }
}

pub(super) fn custom(ctx: &mut ApplyContext<'_>, op: &CustomOperation) -> ChainResult<()> {
    check_payload_size(ctx, op.data.len())
}

pub(super) fn custom_json(ctx: &mut ApplyContext<'_>, op: &CustomJsonOperation) -> ChainResult<()> {
    check_payload_size(ctx, op.json.len())?;
    interpret(ctx, &op.id, &Operation::CustomJson(op.clone()))
}

pub(super) fn custom_binary(
    ctx: &mut ApplyContext<'_>,
    op: &CustomBinaryOperation,
) -> ChainResult<()> {
    check_payload_size(ctx, op.data.len())?;
    interpret(ctx, &op.id, &Operation::CustomBinary(op.clone()))
}

pub(super) fn custom_json_dapp(
    ctx: &mut ApplyContext<'_>,
    op: &CustomJsonDappOperation,
) -> ChainResult<()> {
    check_payload_size(ctx, op.json.len())?;
    interpret(ctx, &op.id, &Operation::CustomJsonDapp(op.clone()))
}
