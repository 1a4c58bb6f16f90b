// Copyright (c) 2024 SIGMA ENGINE

//! Evaluation of operations against the chain state.
//!
//! Every submitted operation is routed by [`evaluate`] to its handler.
//! Handlers run inside the session of their transaction: an error leaves the
//! state to be reverted by the caller.

mod account;
mod bobserver;
mod custom;
mod fund;
mod recovery;
mod transfer;

use crate::custom_op::{CustomOperationInterpreter, InterpreterRegistry};
use crate::state::ChainState;
use sigma_chain_exports::objects::{
    account_prefix, AccountHistoryObject, AccountObject, OperationObject,
};
use sigma_chain_exports::{ChainConfig, ChainError, ChainObserver, ChainResult, OperationNotification};
use sigma_db::{DatabaseResult, ObjectId, UndoableState};
use sigma_hash::Hash;
use sigma_models::constants::ROOT_ACCOUNT;
use sigma_models::{AccountName, Operation};
use sigma_time::SigmaTime;
use std::sync::Arc;

/// Position of the operation being applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationPosition {
    /// enclosing transaction, zero outside of transactions
    pub trx_id: Hash,
    /// height of the block being applied or built
    pub block: u32,
    /// index of the transaction in the block
    pub trx_in_block: u32,
    /// index of the operation in the transaction
    pub op_in_trx: u16,
    /// rank of the last virtual operation emitted by the current operation
    pub virtual_op: u32,
}

/// Everything an evaluator may touch while applying an operation
pub struct ApplyContext<'a> {
    /// chain state
    pub state: &'a mut ChainState,
    /// chain parameters
    pub config: &'a ChainConfig,
    interpreters: &'a InterpreterRegistry,
    observers: &'a [Arc<dyn ChainObserver>],
    producing: bool,
    /// where the current operation sits in the chain
    pub position: OperationPosition,
}

impl<'a> ApplyContext<'a> {
    /// Builds a context over `state`
    pub fn new(
        state: &'a mut ChainState,
        config: &'a ChainConfig,
        interpreters: &'a InterpreterRegistry,
        observers: &'a [Arc<dyn ChainObserver>],
        producing: bool,
        position: OperationPosition,
    ) -> Self {
        ApplyContext {
            state,
            config,
            interpreters,
            observers,
            producing,
            position,
        }
    }

    /// Whether the node is building a block or accepting pending transactions
    pub fn is_producing(&self) -> bool {
        self.producing
    }

    /// Time of the head block
    pub fn head_time(&self) -> ChainResult<SigmaTime> {
        self.state.head_block_time()
    }

    /// Registered observers
    pub fn observers(&self) -> &[Arc<dyn ChainObserver>] {
        self.observers
    }

    /// Interpreter registered under `id`
    pub fn interpreter(&self, id: &str) -> Option<Arc<dyn CustomOperationInterpreter>> {
        self.interpreters.get(id).cloned()
    }

    /// Checks that `root` names the root account
    pub fn check_root(&self, root: &AccountName) -> ChainResult<&AccountObject> {
        if root.as_str() != ROOT_ACCOUNT {
            return Err(ChainError::NotRootAccount(root.clone()));
        }
        Ok(self.state.get_account(root)?.1)
    }

    fn notification(&self, op: &Operation) -> ChainResult<OperationNotification> {
        Ok(OperationNotification {
            trx_id: self.position.trx_id,
            block: self.position.block,
            trx_in_block: self.position.trx_in_block,
            op_in_trx: self.position.op_in_trx,
            virtual_op: self.position.virtual_op,
            timestamp: self.head_time()?,
            op: op.clone(),
        })
    }

    /// Evaluates a submitted operation, notifying observers around it and
    /// recording it in the history of the impacted accounts
    pub fn apply_operation(&mut self, op: &Operation) -> ChainResult<()> {
        self.position.virtual_op = 0;
        let note = self.notification(op)?;
        for observer in self.observers {
            observer.pre_apply_operation(&note);
        }
        evaluate(self, op)?;
        self.record_history(&note)?;
        for observer in self.observers {
            observer.post_apply_operation(&note);
        }
        Ok(())
    }

    /// Emits a virtual operation: notified and recorded, never evaluated
    pub fn push_virtual_operation(&mut self, op: Operation) -> ChainResult<()> {
        if !op.is_virtual() {
            return Err(ChainError::InvalidOperation(format!(
                "{:?} is not a virtual operation",
                op.op_type()
            )));
        }
        self.position.virtual_op += 1;
        let note = self.notification(&op)?;
        for observer in self.observers {
            observer.pre_apply_operation(&note);
        }
        self.record_history(&note)?;
        for observer in self.observers {
            observer.post_apply_operation(&note);
        }
        Ok(())
    }

    fn record_history(&mut self, note: &OperationNotification) -> ChainResult<()> {
        let op_id: ObjectId<OperationObject> = self.state.operations.create(OperationObject {
            trx_id: note.trx_id,
            block: note.block,
            trx_in_block: note.trx_in_block,
            op_in_trx: note.op_in_trx,
            virtual_op: note.virtual_op,
            timestamp: note.timestamp,
            op: note.op.clone(),
        })?;
        for account in note.op.impacted_accounts() {
            let prefix = account_prefix(&account);
            let sequence = self
                .state
                .account_history
                .range_by(AccountHistoryObject::BY_ACCOUNT_SEQUENCE, &prefix)?
                .next()
                .map_or(0, |(_, entry)| entry.sequence + 1);
            self.state.account_history.create(AccountHistoryObject {
                account,
                sequence,
                op: op_id,
            })?;
        }
        Ok(())
    }
}

impl UndoableState for ApplyContext<'_> {
    fn start_undo(&mut self) -> i64 {
        self.state.start_undo()
    }

    fn undo(&mut self) {
        self.state.undo()
    }

    fn squash(&mut self) {
        self.state.squash()
    }

    fn commit(&mut self, revision: i64) {
        self.state.commit(revision)
    }

    fn revision(&self) -> i64 {
        self.state.revision()
    }

    fn set_revision(&mut self, revision: i64) -> DatabaseResult<()> {
        self.state.set_revision(revision)
    }

    fn undo_depth(&self) -> usize {
        self.state.undo_depth()
    }
}

/// Routes a submitted operation to its handler
pub fn evaluate(ctx: &mut ApplyContext<'_>, op: &Operation) -> ChainResult<()> {
    match op {
        Operation::Transfer(op) => transfer::transfer(ctx, op),
        Operation::AccountCreate(op) => account::account_create(ctx, op),
        Operation::AccountUpdate(op) => account::account_update(ctx, op),
        Operation::BobserverUpdate(op) => bobserver::bobserver_update(ctx, op),
        Operation::Custom(op) => custom::custom(ctx, op),
        Operation::CustomJson(op) => custom::custom_json(ctx, op),
        Operation::RequestAccountRecovery(op) => recovery::request_account_recovery(ctx, op),
        Operation::RecoverAccount(op) => recovery::recover_account(ctx, op),
        Operation::ChangeRecoveryAccount(op) => recovery::change_recovery_account(ctx, op),
        Operation::CustomBinary(op) => custom::custom_binary(ctx, op),
        Operation::DeclineVotingRights(op) => account::decline_voting_rights(ctx, op),
        Operation::ResetAccount(_) | Operation::SetResetAccount(_) => {
            Err(ChainError::Disabled(op.op_type()))
        }
        Operation::UpdateBproducer(op) => bobserver::update_bproducer(ctx, op),
        Operation::ExceptBobserver(op) => bobserver::except_bobserver(ctx, op),
        Operation::AccountAuth(op) => account::account_auth(ctx, op),
        Operation::Print(op) => transfer::print(ctx, op),
        Operation::Burn(op) => transfer::burn(ctx, op),
        Operation::TransferSavings(op) => transfer::transfer_savings(ctx, op),
        Operation::CancelTransferSavings(op) => transfer::cancel_transfer_savings(ctx, op),
        Operation::ConclusionTransferSavings(op) => {
            transfer::conclusion_transfer_savings(ctx, op)
        }
        Operation::StakingFund(op) => fund::staking_fund(ctx, op),
        Operation::ConclusionStaking(op) => fund::conclusion_staking(ctx, op),
        Operation::TransferFund(op) => fund::transfer_fund(ctx, op),
        Operation::SetFundInterest(op) => fund::set_fund_interest(ctx, op),
        Operation::ReturnStakingFund(op) => fund::return_staking_fund(ctx, op),
        Operation::CustomJsonDapp(op) => custom::custom_json_dapp(ctx, op),
        Operation::ShutdownBobserver(_)
        | Operation::Hardfork(_)
        | Operation::FillStakingFund(_)
        | Operation::FillTransferSavings(_) => Err(ChainError::VirtualOperation(op.op_type())),
    }
}
