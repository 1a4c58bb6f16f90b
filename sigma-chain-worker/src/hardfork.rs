// Copyright (c) 2024 SIGMA ENGINE

//! Hardfork activation.
//!
//! A hardfork activates once the producers of a round voted for it with a
//! qualified majority and the head block reached the voted time.

use crate::evaluator::ApplyContext;
use sigma_chain_exports::{ChainConfig, ChainError, ChainResult};
use sigma_logging::sigma_trace;
use sigma_models::{HardforkOperation, HardforkVersion, Operation};
use sigma_time::SigmaTime;
use tracing::info;

/// Known hardforks, index 0 being the genesis state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardforkTable {
    versions: Vec<HardforkVersion>,
    times: Vec<SigmaTime>,
}

impl HardforkTable {
    /// Table of `config`: genesis followed by the configured hardforks
    pub fn new(config: &ChainConfig) -> Self {
        let mut versions = vec![HardforkVersion::default()];
        let mut times = vec![config.genesis_time];
        for hardfork in &config.hardforks {
            versions.push(hardfork.version);
            times.push(hardfork.time);
        }
        HardforkTable { versions, times }
    }

    /// Number of hardforks after genesis
    pub fn last(&self) -> u32 {
        (self.versions.len() - 1) as u32
    }

    /// Version introduced by hardfork `hardfork`
    pub fn version(&self, hardfork: u32) -> Option<HardforkVersion> {
        self.versions.get(hardfork as usize).copied()
    }

    /// Earliest activation time of hardfork `hardfork`
    pub fn time(&self, hardfork: u32) -> Option<SigmaTime> {
        self.times.get(hardfork as usize).copied()
    }
}

/// Applies every hardfork that the voted target and the head time allow
pub fn process_hardforks(ctx: &mut ApplyContext<'_>, table: &HardforkTable) -> ChainResult<()> {
    let head_time = ctx.head_time()?;
    loop {
        let property = ctx.state.hardfork_property()?;
        let last = property.last_hardfork;
        let applied = table.version(last).ok_or_else(|| {
            ChainError::InvariantViolation(format!("hardfork {} is not in the table", last))
        })?;
        if applied >= property.next_hardfork || property.next_hardfork_time > head_time {
            return Ok(());
        }
        if last >= table.last() {
            return Err(ChainError::InvariantViolation(format!(
                "voted hardfork {} is unknown to this node",
                property.next_hardfork
            )));
        }
        apply_hardfork(ctx, table, last + 1)?;
    }
}

/// Marks `hardfork` as applied and announces it
pub fn apply_hardfork(
    ctx: &mut ApplyContext<'_>,
    table: &HardforkTable,
    hardfork: u32,
) -> ChainResult<()> {
    let version = table
        .version(hardfork)
        .ok_or_else(|| ChainError::InvariantViolation(format!("unknown hardfork {}", hardfork)))?;
    let head_time = ctx.head_time()?;
    ctx.state.modify_hardfork_property(|property| {
        property.processed_hardforks.push(head_time);
        property.last_hardfork = hardfork;
        property.current_hardfork_version = version;
    })?;
    ctx.push_virtual_operation(Operation::Hardfork(HardforkOperation {
        hardfork_id: hardfork,
    }))?;
    for observer in ctx.observers() {
        observer.on_apply_hardfork(hardfork);
    }
    info!("applied hardfork {} ({}) at {}", hardfork, version, head_time);
    sigma_trace!("chain.hardfork", { "hardfork": hardfork, "version": version.to_string() });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_chain_exports::HardforkConfig;
    use sigma_models::constants::{GENESIS_TIME, HARDFORK_0_1_VERSION};

    #[test]
    fn test_table_starts_at_genesis() {
        let mut config = ChainConfig::default();
        config.hardforks.push(HardforkConfig {
            version: HardforkVersion::new(0, 2),
            time: SigmaTime::from_secs(2_000_000_000),
        });
        let table = HardforkTable::new(&config);
        assert_eq!(table.last(), 2);
        assert_eq!(table.version(0), Some(HardforkVersion::default()));
        assert_eq!(table.time(0), Some(GENESIS_TIME));
        assert_eq!(table.version(1), Some(HARDFORK_0_1_VERSION));
        assert_eq!(table.time(2), Some(SigmaTime::from_secs(2_000_000_000)));
        assert_eq!(table.version(3), None);
    }
}
