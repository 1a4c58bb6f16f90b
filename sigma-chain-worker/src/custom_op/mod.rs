// Copyright (c) 2024 SIGMA ENGINE

//! Interpreters of the payload of custom operations.
//!
//! A `custom_json`, `custom_json_dapp` or `custom_binary` operation carries a
//! list of inner operations. The interpreter registered under its id decodes
//! them, checks that they need exactly the authorities the outer operation
//! declared, and applies them atomically.

mod producer_vote;

pub use producer_vote::{ProducerVoteDeserializer, ProducerVoteOperation, ProducerVoteSerializer};

use crate::evaluator::ApplyContext;
use serde::de::DeserializeOwned;
use sigma_chain_exports::{ChainError, ChainResult};
use sigma_db::UndoableState;
use sigma_models::{Operation, RequiredAuthorities};
use sigma_serialization::{deserialize_exact, Deserializer, VecDeserializer};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

/// Maximal number of inner operations in a binary payload
pub const MAX_INNER_OPERATIONS: u32 = 1024;

/// Interprets custom operations registered under an id
pub trait CustomOperationInterpreter: Send + Sync {
    /// Applies the payload of `outer`
    fn apply(&self, ctx: &mut ApplyContext<'_>, outer: &Operation) -> ChainResult<()>;
}

/// Interpreters by id
pub type InterpreterRegistry = BTreeMap<String, Arc<dyn CustomOperationInterpreter>>;

/// Inner operation set understood by [`GenericCustomOperationInterpreter`]
pub trait CustomOperation: Clone + Debug + DeserializeOwned + Send + Sync + 'static {
    /// Binary decoder of a single inner operation
    type Deserializer: Deserializer<Self>;

    /// Creates the binary decoder
    fn deserializer() -> Self::Deserializer;

    /// Stateless checks
    fn validate(&self) -> ChainResult<()>;

    /// Authorities the inner operation needs
    fn required_authorities(&self) -> RequiredAuthorities;

    /// Applies the inner operation
    fn evaluate(&self, ctx: &mut ApplyContext<'_>) -> ChainResult<()>;
}

/// Interpreter of any [`CustomOperation`] set
pub struct GenericCustomOperationInterpreter<T> {
    phantom: PhantomData<fn() -> T>,
}

impl<T: CustomOperation> GenericCustomOperationInterpreter<T> {
    /// Creates an interpreter for `T`
    pub fn new() -> Self {
        GenericCustomOperationInterpreter {
            phantom: PhantomData,
        }
    }

    fn decode_json(json: &str) -> ChainResult<Vec<T>> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|err| ChainError::DecodeError(err.to_string()))?;
        let decoded = if value.is_array() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value(value).map(|op| vec![op])
        };
        decoded.map_err(|err| ChainError::DecodeError(err.to_string()))
    }

    fn decode_binary(data: &[u8]) -> ChainResult<Vec<T>> {
        let list = VecDeserializer::new(T::deserializer(), MAX_INNER_OPERATIONS);
        deserialize_exact(&list, data)
            .or_else(|_| deserialize_exact(&T::deserializer(), data).map(|op| vec![op]))
            .map_err(ChainError::DecodeError)
    }

    fn decode(outer: &Operation) -> ChainResult<Vec<T>> {
        match outer {
            Operation::CustomJson(op) => Self::decode_json(&op.json),
            Operation::CustomJsonDapp(op) => Self::decode_json(&op.json),
            Operation::CustomBinary(op) => Self::decode_binary(&op.data),
            other => Err(ChainError::InvalidOperation(format!(
                "{:?} carries no custom payload",
                other.op_type()
            ))),
        }
    }
}

impl<T: CustomOperation> Default for GenericCustomOperationInterpreter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CustomOperation> CustomOperationInterpreter for GenericCustomOperationInterpreter<T> {
    fn apply(&self, ctx: &mut ApplyContext<'_>, outer: &Operation) -> ChainResult<()> {
        let mut session = ctx.start_undo_session();
        let inner = Self::decode(outer)?;

        let mut required = RequiredAuthorities::default();
        for op in &inner {
            op.validate()?;
            required.extend(op.required_authorities());
        }
        if required != outer.required_authorities() {
            return Err(ChainError::AuthorityMismatch);
        }

        for op in &inner {
            op.evaluate(&mut session)?;
        }
        session.squash();
        Ok(())
    }
}

/// Registry with the interpreters every node runs
pub fn default_interpreters() -> InterpreterRegistry {
    let mut registry = InterpreterRegistry::new();
    registry.insert(
        ProducerVoteOperation::ID.to_string(),
        Arc::new(GenericCustomOperationInterpreter::<ProducerVoteOperation>::new()),
    );
    registry
}
