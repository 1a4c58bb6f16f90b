// Copyright (c) 2024 SIGMA ENGINE

#![warn(missing_docs)]
//! 32-byte blake3 hashes used for block, transaction and chain identifiers
pub use error::HashError;
pub use hash::{Hash, HashDeserializer, HashSerializer};
pub use settings::HASH_SIZE_BYTES;

mod error;
mod hash;
mod settings;
