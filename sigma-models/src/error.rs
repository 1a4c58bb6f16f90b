// Copyright (c) 2024 SIGMA ENGINE

use displaydoc::Display;
use thiserror::Error;

/// Result alias for protocol-level checks
pub type ModelsResult<T, E = ModelsError> = core::result::Result<T, E>;

/// Errors raised by structural validation and protocol types
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum ModelsError {
    /// Account name `{0}` is invalid
    InvalidAccountName(String),
    /// Invalid authority: {0}
    InvalidAuthority(String),
    /// Invalid operation: {0}
    InvalidOperation(String),
    /// Invalid transaction: {0}
    InvalidTransaction(String),
    /// Invalid block: {0}
    InvalidBlock(String),
    /// Invalid asset symbol: {0}
    InvalidAssetSymbol(String),
    /// amount parse error: {0}
    AmountParseError(String),
    /// Amount overflow
    AmountOverflowError,
    /// invalid version identifier: {0}
    InvalidVersion(String),
    /// Serialization error: {0}
    SerializeError(String),
    /// Deserialization error: {0}
    DeserializeError(String),
    /// hash error: {0}
    HashError(#[from] sigma_hash::HashError),
    /// signature error: {0}
    SignatureError(#[from] sigma_signature::SignatureError),
    /// time error: {0}
    TimeError(#[from] sigma_time::TimeError),
}

impl From<sigma_serialization::SerializeError> for ModelsError {
    fn from(err: sigma_serialization::SerializeError) -> Self {
        ModelsError::SerializeError(err.to_string())
    }
}
