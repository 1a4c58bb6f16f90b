// Copyright (c) 2024 SIGMA ENGINE
//! Build here the default node settings from the config file toml
use serde::{Deserialize, Deserializer};
use sigma_chain_exports::ChainConfig;
use std::path::Path;
use std::time::Duration;

pub const BASE_CONFIG_PATH: &str = "base_config/config.toml";
pub const OVERRIDE_CONFIG_PATH: &str = "config/config.toml";
const ENV_PREFIX: &str = "SIGMA";

/// Reads the base configuration, then the override file when present, then
/// `SIGMA__<SECTION>__<KEY>` environment variables
pub fn load_settings(base: &Path, overrides: &Path) -> anyhow::Result<Settings> {
    let mut builder = config::Config::builder().add_source(config::File::from(base));
    if overrides.is_file() {
        builder = builder.add_source(config::File::from(overrides));
    }
    let settings = builder
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()?
        .try_deserialize()?;
    Ok(settings)
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub filter: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeSettings {
    pub genesis_at_startup: bool,
    #[serde(deserialize_with = "human_duration")]
    pub slot_poll_interval: Duration,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProducerSettings {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub node: NodeSettings,
    #[serde(default)]
    pub producer: ProducerSettings,
    #[serde(default)]
    pub chain: ChainConfig,
}

fn human_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    humantime::parse_duration(&text).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn base_path() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(BASE_CONFIG_PATH)
    }

    #[test]
    fn test_base_config() {
        let settings = load_settings(&base_path(), Path::new("missing/config.toml")).unwrap();
        assert!(settings.node.genesis_at_startup);
        assert_eq!(settings.node.slot_poll_interval, Duration::from_millis(250));
        assert_eq!(settings.producer.name, "chainmaker");
        assert_eq!(settings.chain.chain_id_seed, "sigma-devnet");
        assert_eq!(settings.chain.init_supply.to_string(), "1000000");
        assert_eq!(settings.chain.num_bobservers, ChainConfig::default().num_bobservers);
    }

    #[test]
    fn test_override_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[node]\nslot_poll_interval = \"1s 500ms\"\n[chain]\nnum_bobservers = 3"
        )
        .unwrap();
        let settings = load_settings(&base_path(), file.path()).unwrap();
        assert_eq!(settings.node.slot_poll_interval, Duration::from_millis(1500));
        assert!(settings.node.genesis_at_startup);
        assert_eq!(settings.chain.num_bobservers, 3);
        assert_eq!(settings.chain.chain_id_seed, "sigma-devnet");
    }
}
