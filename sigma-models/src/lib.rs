// Copyright (c) 2024 SIGMA ENGINE
//! Protocol types of the chain: names, amounts, authorities, operations,
//! transactions and blocks, with their canonical binary encoding.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

pub use account::AccountName;
pub use amount::{Amount, Asset, AssetSymbol, InterestRate};
pub use authority::{Authority, AuthorityLevel, RequiredAuthorities};
pub use block::{
    BlockHeader, BlockHeaderExtension, BlockId, SignedBlock, SignedBlockDeserializer,
    SignedBlockHeader, SignedBlockSerializer,
};
pub use error::{ModelsError, ModelsResult};
pub use operation::*;
pub use operation_codec::{OperationDeserializer, OperationSerializer};
pub use transaction::{
    SignedTransaction, SignedTransactionDeserializer, SignedTransactionSerializer, Transaction,
    TransactionId,
};
pub use version::{HardforkVersion, HardforkVersionVote, Version};

/// account names
pub mod account;
/// amounts and assets
pub mod amount;
/// authorities
pub mod authority;
/// blocks and block ids
pub mod block;
/// protocol constants
pub mod constants;
/// models error
pub mod error;
mod operation;
/// binary encoding of operations
pub mod operation_codec;
/// transactions
pub mod transaction;
/// node and hardfork versions
pub mod version;

#[cfg(any(test, feature = "test-exports"))]
/// helpers for tests of dependent crates
pub mod test_exports;
