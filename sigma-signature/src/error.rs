// Copyright (c) 2024 SIGMA ENGINE

use displaydoc::Display;
use thiserror::Error;

/// Signature error
#[non_exhaustive]
#[derive(Display, Error, Debug, Clone)]
pub enum SignatureError {
    /// Parsing error: {0}
    ParsingError(String),
    /// Signature error: {0}
    SignatureError(String),
    /// Non-canonical signature: the s value must be in the lower half of the curve order
    NonCanonical,
    /// Invalid key prefix: expected {expected}, got {got}
    InvalidPrefix {
        /// expected prefix
        expected: String,
        /// actual text
        got: String,
    },
}
