// Copyright (c) 2024 SIGMA ENGINE

use serde::Deserialize;
use sigma_hash::Hash;
use sigma_models::constants::*;
use sigma_models::{AccountName, Amount, HardforkVersion};
use sigma_signature::{PrivateKey, PublicKey};
use sigma_time::SigmaTime;

/// Activation entry of the hardfork table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HardforkConfig {
    /// version introduced by the hardfork
    pub version: HardforkVersion,
    /// earliest activation time
    pub time: SigmaTime,
}

/// Chain configuration.
///
/// Every network shares these values, changing one on a running network
/// forks it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// seed of the chain id mixed into every transaction digest
    pub chain_id_seed: String,
    /// seconds between two slots
    pub block_interval: u32,
    /// producer slots per round
    pub num_bobservers: u32,
    /// producers chosen by vote per round
    pub max_voted_bobservers: u32,
    /// producers chosen by mining per round
    pub max_miner_bobservers: u32,
    /// producers chosen by time share per round
    pub max_runner_bobservers: u32,
    /// producers that must agree on a version or hardfork
    pub hardfork_required_bobservers: u32,
    /// nesting depth of account authorities
    pub max_sig_check_depth: u32,
    /// maximal encoded block size
    pub maximum_block_size: u64,
    /// maximal distance between head time and transaction expiration, in seconds
    pub max_time_until_expiration: u32,
    /// minimal delay between two owner changes, in seconds
    pub owner_update_limit: u32,
    /// window in which a previous owner authority proves ownership, in seconds
    pub owner_auth_recovery_period: u32,
    /// lifetime of a recovery request, in seconds
    pub account_recovery_request_expiration_period: u32,
    /// maximal number of reversible blocks
    pub max_undo_history: u32,
    /// share of producers, in hundredths of a percent, confirming irreversibility
    pub irreversible_threshold: u32,
    /// time of the genesis state
    pub genesis_time: SigmaTime,
    /// supply credited to the initial producer
    pub init_supply: Amount,
    /// initial producer account
    pub init_miner_name: AccountName,
    /// key of the initial accounts
    pub init_public_key: PublicKey,
    /// maximal size of a custom operation payload accepted in produced blocks
    pub max_custom_payload_size: usize,
    /// hardforks after genesis, in activation order
    pub hardforks: Vec<HardforkConfig>,
}

impl Default for ChainConfig {
    fn default() -> Self {
        ChainConfig {
            chain_id_seed: "sigma".to_string(),
            block_interval: BLOCK_INTERVAL,
            num_bobservers: NUM_BOBSERVERS,
            max_voted_bobservers: MAX_VOTED_BOBSERVERS,
            max_miner_bobservers: MAX_MINER_BOBSERVERS,
            max_runner_bobservers: MAX_RUNNER_BOBSERVERS,
            hardfork_required_bobservers: HARDFORK_REQUIRED_BOBSERVERS,
            max_sig_check_depth: MAX_SIG_CHECK_DEPTH,
            maximum_block_size: MAX_BLOCK_SIZE,
            max_time_until_expiration: MAX_TIME_UNTIL_EXPIRATION,
            owner_update_limit: OWNER_UPDATE_LIMIT,
            owner_auth_recovery_period: OWNER_AUTH_RECOVERY_PERIOD,
            account_recovery_request_expiration_period:
                ACCOUNT_RECOVERY_REQUEST_EXPIRATION_PERIOD,
            max_undo_history: MAX_UNDO_HISTORY,
            irreversible_threshold: IRREVERSIBLE_THRESHOLD,
            genesis_time: GENESIS_TIME,
            init_supply: Amount::zero(),
            init_miner_name: AccountName::new(INIT_MINER_NAME),
            init_public_key: PrivateKey::from_seed(INIT_MINER_NAME).public_key(),
            max_custom_payload_size: MAX_CUSTOM_PAYLOAD_SIZE,
            hardforks: vec![HardforkConfig {
                version: HARDFORK_0_1_VERSION,
                time: GENESIS_TIME,
            }],
        }
    }
}

impl ChainConfig {
    /// Chain id mixed into transaction digests
    pub fn chain_id(&self) -> Hash {
        Hash::compute_from(self.chain_id_seed.as_bytes())
    }

    /// Number of hardforks after genesis
    pub fn num_hardforks(&self) -> u32 {
        self.hardforks.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_protocol_defaults() {
        let config: ChainConfig = serde_json::from_str(
            r#"{"chain_id_seed": "testnet", "num_bobservers": 3, "init_supply": "1000"}"#,
        )
        .unwrap();
        assert_eq!(config.num_bobservers, 3);
        assert_eq!(config.init_supply.to_string(), "1000");
        assert_eq!(config.block_interval, BLOCK_INTERVAL);
        assert_ne!(config.chain_id(), ChainConfig::default().chain_id());
        assert_eq!(config.num_hardforks(), NUM_HARDFORKS);
    }
}
