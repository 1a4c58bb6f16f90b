// Copyright (c) 2024 SIGMA ENGINE

//! secp256k1 keys and recoverable signatures.
//!
//! Transactions and block headers only carry signatures: the signing keys
//! are recovered from them and compared against authorities.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod error;
mod signature_impl;

pub use error::SignatureError;
pub use signature_impl::{
    PrivateKey, PublicKey, PublicKeyDeserializer, PublicKeySerializer, Signature,
    SignatureDeserializer, SignatureSerializer, PUBLIC_KEY_PREFIX, PUBLIC_KEY_SIZE_BYTES,
    SIGNATURE_SIZE_BYTES,
};

#[cfg(test)]
mod tests;
