// Copyright (c) 2024 SIGMA ENGINE
//! # Overview
//!
//! Definitions shared by the chain worker and its users.
//!
//! The chain worker (`sigma_chain_worker`) owns the state and applies blocks
//! and transactions. Its users talk to it through the [`ChainController`]
//! trait, configure it with a [`ChainConfig`] and may follow what it applies
//! by registering [`ChainObserver`]s.
//!
//! ## config.rs
//! Chain parameters with defaults taken from the protocol constants.
//!
//! ## controller_traits.rs
//! The `ChainController` and `ChainManager` traits.
//!
//! ## error.rs
//! `ChainError` and its classification.
//!
//! ## objects.rs
//! Rows of the chain state, returned by queries.
//!
//! ## Test exports
//!
//! With the `test-exports` feature, mocks of the traits and a test
//! configuration are exported.
#![warn(missing_docs)]
#![warn(unused_crate_dependencies)]

mod config;
mod controller_traits;
mod error;
pub mod objects;
mod observer;
mod skip_flags;

pub use config::{ChainConfig, HardforkConfig};
pub use controller_traits::{ChainController, ChainManager};
pub use error::{ChainError, ChainResult, ErrorKind};
pub use observer::{ChainObserver, OperationNotification};
pub use skip_flags::SkipFlags;

#[cfg(any(test, feature = "test-exports"))]
pub use controller_traits::MockChainController;
#[cfg(any(test, feature = "test-exports"))]
pub use observer::MockChainObserver;

/// Exports related to tests as mocks and configurations
#[cfg(feature = "test-exports")]
pub mod test_exports;
