// Copyright (c) 2024 SIGMA ENGINE

//! Protocol constants.
//!
//! Changing any of these values is a consensus breaking change. The values
//! that a network may tune are mirrored in the chain configuration, which
//! takes its defaults from here.

use crate::amount::AssetSymbol;
use crate::version::{HardforkVersion, Version};
use sigma_time::SigmaTime;

/// Number of decimals of every amount
pub const AMOUNT_DECIMAL_DIGITS: u32 = 6;
/// Fixed point factor of amounts
pub const AMOUNT_DECIMAL_FACTOR: u64 = 1_000_000;
/// Base asset of the chain
pub const BASE_SYMBOL: AssetSymbol = AssetSymbol::from_raw(
    AMOUNT_DECIMAL_DIGITS as u64 | (b'T' as u64) << 8 | (b'N' as u64) << 16 | (b'C' as u64) << 24,
);

/// Version of the protocol implemented by this node
pub const BLOCKCHAIN_VERSION: Version = Version::new(0, 1, 0);
/// Hardfork part of `BLOCKCHAIN_VERSION`
pub const BLOCKCHAIN_HARDFORK_VERSION: HardforkVersion =
    HardforkVersion::from_version(BLOCKCHAIN_VERSION);
/// Version that activates the first hardfork
pub const HARDFORK_0_1_VERSION: HardforkVersion = HardforkVersion::new(0, 1);
/// Number of hardforks known by this node, genesis excluded
pub const NUM_HARDFORKS: u32 = 1;

/// Genesis time of the main network
pub const GENESIS_TIME: SigmaTime = SigmaTime::from_secs(1_571_116_444);
/// Seconds between two blocks
pub const BLOCK_INTERVAL: u32 = 3;
/// Blocks per day at `BLOCK_INTERVAL`
pub const BLOCKS_PER_DAY: u32 = 24 * 60 * 60 / BLOCK_INTERVAL;
/// One day in seconds
pub const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

/// Name of the first producer
pub const INIT_MINER_NAME: &str = "chainmaker";
/// Number of producer slots per schedule round
pub const NUM_BOBSERVERS: u32 = 21;
/// Producers picked by vote rank each round
pub const MAX_VOTED_BOBSERVERS: u32 = 17;
/// Slots reserved for miners
pub const MAX_MINER_BOBSERVERS: u32 = 4;
/// Slots reserved for runner-up producers
pub const MAX_RUNNER_BOBSERVERS: u32 = 10;
/// Scheduled producers that must agree on a version for it to become the majority
pub const HARDFORK_REQUIRED_BOBSERVERS: u32 = 17;

/// Upper bound of `expiration - head_time` for a transaction, in seconds
pub const MAX_TIME_UNTIL_EXPIRATION: u32 = 60 * 60;
/// Maximum memo length, exclusive
pub const MAX_MEMO_SIZE: usize = 2048;
/// Full percentage in basis points
pub const PERCENT_100: u32 = 10_000;
/// One percent in basis points
pub const PERCENT_1: u32 = PERCENT_100 / 100;
/// Minimal length of an account name
pub const MIN_ACCOUNT_NAME_LENGTH: usize = 3;
/// Maximal length of an account name
pub const MAX_ACCOUNT_NAME_LENGTH: usize = 64;
/// Maximal length of a producer url
pub const MAX_BOBSERVER_URL_LENGTH: usize = 2048;
/// Depth limit of account authorities nested into other authorities
pub const MAX_SIG_CHECK_DEPTH: u32 = 2;
/// Maximal size of a transaction
pub const MAX_TRANSACTION_SIZE: u32 = 1024 * 64 * 200;
/// Maximal size of a block
pub const MAX_BLOCK_SIZE: u64 = MAX_TRANSACTION_SIZE as u64 * BLOCK_INTERVAL as u64 * 2000;
/// Minimal size of a block
pub const MIN_BLOCK_SIZE: u32 = 115;
/// Maximal number of reversible blocks kept in the undo history
pub const MAX_UNDO_HISTORY: u32 = 10_000;
/// Share of scheduled producers that must confirm a block for it to become irreversible
pub const IRREVERSIBLE_THRESHOLD: u32 = 75 * PERCENT_1;

/// Delay between two owner authority changes, in seconds
pub const OWNER_UPDATE_LIMIT: u32 = 5;
/// Window during which an old owner authority can prove ownership, in seconds
pub const OWNER_AUTH_RECOVERY_PERIOD: u32 = 30 * SECONDS_PER_DAY;
/// Lifetime of an account recovery request, in seconds
pub const ACCOUNT_RECOVERY_REQUEST_EXPIRATION_PERIOD: u32 = SECONDS_PER_DAY;

/// Maximal length of a custom operation id
pub const MAX_CUSTOM_ID_LENGTH: usize = 32;
/// Maximal payload of a custom operation accepted while producing
pub const MAX_CUSTOM_PAYLOAD_SIZE: usize = 8192;

/// Account collecting mined blocks
pub const MINER_ACCOUNT: &str = "miners";
/// Account that nobody controls
pub const NULL_ACCOUNT: &str = "null";
/// Account whose authority is always satisfied
pub const TEMP_ACCOUNT: &str = "temp";
/// Privileged account gating administrative operations
pub const ROOT_ACCOUNT: &str = "root";

/// Fund created at genesis
pub const DEPOSIT_FUND_NAME: &str = "deposit";
/// Longest staking period, in months
pub const MAX_STAKING_MONTH: usize = 12;
/// Number of user types with distinct interest rates
pub const MAX_USER_TYPE: usize = 2;
/// Decimal digits of an interest percentage
pub const STAKING_INTEREST_PRECISION_DIGITS: u32 = 3;
/// Length of a staking month, in seconds
pub const STAKING_MONTH_PERIOD: u32 = 30 * SECONDS_PER_DAY;
