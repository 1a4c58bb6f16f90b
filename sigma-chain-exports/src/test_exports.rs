// Copyright (c) 2024 SIGMA ENGINE

use crate::config::ChainConfig;
use sigma_models::constants::INIT_MINER_NAME;
use sigma_models::test_exports::account_key;
use sigma_models::Amount;

/// Configuration of test chains: a dedicated chain id and a funded initial producer
pub fn test_chain_config() -> ChainConfig {
    ChainConfig {
        chain_id_seed: "sigma testnet".to_string(),
        init_supply: Amount::from_raw(1_000_000_000_000),
        init_public_key: account_key(INIT_MINER_NAME).public_key(),
        ..ChainConfig::default()
    }
}
