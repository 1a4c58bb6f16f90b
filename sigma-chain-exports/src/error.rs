// Copyright (c) 2024 SIGMA ENGINE

use displaydoc::Display;
use sigma_db::DatabaseError;
use sigma_models::{AccountName, ModelsError, OperationType};
use sigma_signature::SignatureError;
use thiserror::Error;

/// Result alias for chain operations
pub type ChainResult<T, E = ChainError> = core::result::Result<T, E>;

/// Class of a [`ChainError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// malformed input or rule violation
    Validation,
    /// missing or irrelevant signatures
    Authority,
    /// missing state or insufficient balance
    Resource,
    /// custom operation payload that could not be decoded
    RecoverableDecode,
    /// block level failure
    Block,
}

/// Chain error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum ChainError {
    /// models error: {0}
    ModelsError(#[from] ModelsError),
    /// database error: {0}
    DatabaseError(#[from] DatabaseError),
    /// signature error: {0}
    SignatureError(#[from] SignatureError),
    /// invalid operation: {0}
    InvalidOperation(String),
    /// virtual operation {0:?} cannot be submitted
    VirtualOperation(OperationType),
    /// duplicate transaction {0}
    DuplicateTransaction(String),
    /// transaction expired or expiration out of range: {0}
    Expired(String),
    /// operation {0:?} is disabled
    Disabled(OperationType),
    /// missing {level} authority of {account}
    MissingAuthority {
        /// authority level
        level: String,
        /// account whose authority is missing
        account: String,
    },
    /// missing raw authority
    MissingOtherAuthority,
    /// irrelevant signatures from {0}
    IrrelevantSignature(String),
    /// authorities of the inner operations differ from the outer operation
    AuthorityMismatch,
    /// {0} is not the root account
    NotRootAccount(AccountName),
    /// unknown account {0}
    UnknownAccount(AccountName),
    /// unknown bobserver {0}
    UnknownProducer(AccountName),
    /// unknown fund {0}
    UnknownFund(String),
    /// unknown withdraw request {request_id} of {account}
    UnknownWithdraw {
        /// requesting account
        account: AccountName,
        /// request id
        request_id: u32,
    },
    /// unknown recovery request for {0}
    UnknownRecoveryRequest(AccountName),
    /// insufficient balance of {account}: {required} required, {available} available
    InsufficientBalance {
        /// debited account
        account: AccountName,
        /// required amount
        required: String,
        /// available amount
        available: String,
    },
    /// insufficient fund {fund}: {required} required, {available} available
    InsufficientFund {
        /// debited fund
        fund: String,
        /// required amount
        required: String,
        /// available amount
        available: String,
    },
    /// custom operation decode error: {0}
    DecodeError(String),
    /// invalid block: {0}
    InvalidBlock(String),
    /// unlinkable block: {0}
    UnlinkableBlock(String),
    /// state invariant violated: {0}
    InvariantViolation(String),
    /// the chain is stopped
    Stopped,
    /// transaction {trx_in_block} operation {op_in_trx} failed: {source}
    TransactionFailed {
        /// index of the transaction in its block
        trx_in_block: u32,
        /// index of the operation in its transaction
        op_in_trx: u32,
        /// original error
        source: Box<ChainError>,
    },
    /// operation {op_in_trx} failed: {source}
    OperationFailed {
        /// index of the operation in its transaction
        op_in_trx: u32,
        /// original error
        source: Box<ChainError>,
    },
}

impl ChainError {
    /// Class of the error. Wrappers report the class of the error they carry.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::ModelsError(_)
            | ChainError::InvalidOperation(_)
            | ChainError::VirtualOperation(_)
            | ChainError::DuplicateTransaction(_)
            | ChainError::Expired(_)
            | ChainError::Disabled(_) => ErrorKind::Validation,
            ChainError::SignatureError(_)
            | ChainError::MissingAuthority { .. }
            | ChainError::MissingOtherAuthority
            | ChainError::IrrelevantSignature(_)
            | ChainError::AuthorityMismatch
            | ChainError::NotRootAccount(_) => ErrorKind::Authority,
            ChainError::DatabaseError(_)
            | ChainError::UnknownAccount(_)
            | ChainError::UnknownProducer(_)
            | ChainError::UnknownFund(_)
            | ChainError::UnknownWithdraw { .. }
            | ChainError::UnknownRecoveryRequest(_)
            | ChainError::InsufficientBalance { .. }
            | ChainError::InsufficientFund { .. } => ErrorKind::Resource,
            ChainError::DecodeError(_) => ErrorKind::RecoverableDecode,
            ChainError::InvalidBlock(_)
            | ChainError::UnlinkableBlock(_)
            | ChainError::InvariantViolation(_)
            | ChainError::Stopped => ErrorKind::Block,
            ChainError::TransactionFailed { source, .. }
            | ChainError::OperationFailed { source, .. } => source.kind(),
        }
    }

    /// Innermost error, unwrapping transaction and operation wrappers
    pub fn root_cause(&self) -> &ChainError {
        match self {
            ChainError::TransactionFailed { source, .. }
            | ChainError::OperationFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_wrappers_keep_kind_and_cause() {
        let cause = ChainError::InsufficientBalance {
            account: AccountName::new("alice"),
            required: "70.000000 TNC".to_string(),
            available: "60.000000 TNC".to_string(),
        };
        let wrapped = ChainError::TransactionFailed {
            trx_in_block: 2,
            op_in_trx: 0,
            source: Box::new(ChainError::OperationFailed {
                op_in_trx: 0,
                source: Box::new(cause),
            }),
        };
        assert_eq!(wrapped.kind(), ErrorKind::Resource);
        assert_matches!(wrapped.root_cause(), ChainError::InsufficientBalance { .. });
        assert!(wrapped.to_string().starts_with("transaction 2 operation 0 failed"));
    }
}
