// Copyright (c) 2024 SIGMA ENGINE
//! # General description
//!
//! The chain worker owns the chain state and applies blocks and
//! transactions to it. Users reach it through the `ChainController` returned
//! by [`start_chain_worker`], which serializes writes and runs queries
//! concurrently.
//!
//! ## state/
//! Tables of the chain state, moving together through undo revisions, and
//! the balance and supply bookkeeping shared by the evaluators.
//!
//! ## authority.rs
//! Verification of transaction signatures against account authorities.
//!
//! ## evaluator/
//! One handler per submitted operation. Each runs inside the undo revision
//! of its transaction.
//!
//! ## custom_op/
//! Interpreters of the payload of custom operations, among which the
//! producer votes.
//!
//! ## chain/
//! The pipeline: block and transaction application, fork switching,
//! pending transactions, block production and irreversibility.
//!
//! ## schedule.rs and hardfork.rs
//! Producer rounds, version and hardfork tallies, hardfork activation.
//!
//! ## fork_database.rs and block_log.rs
//! Reversible blocks of every branch and the log of irreversible blocks.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod authority;
mod block_log;
mod chain;
mod controller;
mod custom_op;
mod evaluator;
mod fork_database;
mod genesis;
mod hardfork;
mod manager;
mod schedule;
mod state;
mod worker;

pub use authority::{
    get_potential_signatures, get_required_signatures, verify_authority, AuthorityResolver,
};
pub use chain::Chain;
pub use controller::ChainControllerImpl;
pub use custom_op::{
    default_interpreters, CustomOperation, CustomOperationInterpreter,
    GenericCustomOperationInterpreter, InterpreterRegistry, ProducerVoteDeserializer,
    ProducerVoteOperation, ProducerVoteSerializer,
};
pub use evaluator::{ApplyContext, OperationPosition};
pub use state::ChainState;
pub use worker::start_chain_worker;

#[cfg(test)]
mod tests;
