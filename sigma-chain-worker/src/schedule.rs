// Copyright (c) 2024 SIGMA ENGINE

//! Producer schedule of each round and the version and hardfork tallies
//! taken over the producers of the previous round.

use crate::evaluator::ApplyContext;
use crate::state::ChainState;
use sigma_chain_exports::objects::BobserverObject;
use sigma_chain_exports::{ChainConfig, ChainResult};
use sigma_logging::sigma_trace;
use sigma_models::{AccountName, HardforkVersion, Operation, ShutdownBobserverOperation, Version};
use sigma_time::SigmaTime;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

const SHUFFLE_MULTIPLIER: u64 = 2685821657736338717;

/// Shuffles `names` in place with a xorshift generator seeded by `now`.
///
/// Every node computes the same permutation for the same head time.
pub fn shuffle(names: &mut [AccountName], now: SigmaTime) {
    let now_hi = (now.to_secs() as u64) << 32;
    let n = names.len() as u64;
    for i in 0..n {
        let mut k = now_hi.wrapping_add(i.wrapping_mul(SHUFFLE_MULTIPLIER));
        k ^= k >> 12;
        k ^= k << 25;
        k ^= k >> 27;
        k = k.wrapping_mul(SHUFFLE_MULTIPLIER);
        let j = i + k % (n - i);
        names.swap(i as usize, j as usize);
    }
}

/// Highest version run by at least `required` producers, counting each
/// producer for every version up to its own
fn majority_version(
    versions: &BTreeMap<Reverse<Version>, u32>,
    required: u32,
) -> Option<Version> {
    let mut on_version = 0;
    versions.iter().find_map(|(Reverse(version), count)| {
        on_version += count;
        (on_version >= required).then_some(*version)
    })
}

/// Recomputes the schedule when the head block closes a round
pub fn update_bobserver_schedule(ctx: &mut ApplyContext<'_>) -> ChainResult<()> {
    let head = ctx.state.head_block_num()?;
    if head % ctx.config.num_bobservers != 0 {
        return Ok(());
    }
    let now = ctx.head_time()?;

    let excepted: Vec<AccountName> = ctx
        .state
        .bobservers
        .iter_by(BobserverObject::BY_VOTE_NAME)?
        .filter(|(_, bobserver)| bobserver.is_excepted && !bobserver.signing_key.is_null())
        .map(|(_, bobserver)| bobserver.account.clone())
        .collect();
    for owner in excepted {
        ctx.state
            .modify_bobserver(&owner, |bobserver| bobserver.signing_key = Default::default())?;
        ctx.push_virtual_operation(Operation::ShutdownBobserver(ShutdownBobserverOperation {
            owner,
        }))?;
    }

    let schedule = ctx.state.bobserver_schedule()?.clone();
    let mut active: Vec<AccountName> = ctx
        .state
        .bobservers
        .iter_by(BobserverObject::BY_VOTE_NAME)?
        .filter(|(_, bobserver)| !bobserver.signing_key.is_null())
        .take(schedule.max_voted_bobservers as usize)
        .map(|(_, bobserver)| bobserver.account.clone())
        .collect();
    let num_bp = active.len();
    // miner and time-share classes never fill a slot on this chain
    let num_miners = 0;
    let num_timeshare = active.len() - num_bp - num_miners;
    debug!(
        "schedule at block {}: {} voted, {} miners, {} time-share",
        head, num_bp, num_miners, num_timeshare
    );

    let mut versions: BTreeMap<Reverse<Version>, u32> = BTreeMap::new();
    let mut hardfork_votes: BTreeMap<(HardforkVersion, SigmaTime), u32> = BTreeMap::new();
    for name in schedule
        .current_shuffled_bobservers
        .iter()
        .take(schedule.num_scheduled_bobservers as usize)
    {
        let Some((_, bobserver)) = ctx.state.find_bobserver(name) else {
            continue;
        };
        *versions.entry(Reverse(bobserver.running_version)).or_default() += 1;
        *hardfork_votes
            .entry((bobserver.hardfork_version_vote, bobserver.hardfork_time_vote))
            .or_default() += 1;
    }
    let required = schedule.hardfork_required_bobservers;
    let majority = majority_version(&versions, required).unwrap_or(schedule.majority_version);
    let next_hardfork = hardfork_votes
        .iter()
        .find(|(_, count)| **count >= required)
        .map(|(vote, _)| *vote);
    ctx.state.modify_hardfork_property(|hardforks| match next_hardfork {
        Some((version, time)) => {
            hardforks.next_hardfork = version;
            hardforks.next_hardfork_time = time;
        }
        None => hardforks.next_hardfork = hardforks.current_hardfork_version,
    })?;

    let num_scheduled = active.len().max(1);
    active.resize(num_scheduled, AccountName::default());
    shuffle(&mut active, now);
    let mut shuffled = active;
    shuffled.resize(
        (ctx.config.num_bobservers as usize).max(num_scheduled),
        AccountName::default(),
    );
    sigma_trace!("chain.schedule", {
        "block_num": head,
        "shuffled": shuffled.iter().map(|name| name.to_string()).collect::<Vec<_>>(),
        "majority_version": majority.to_string(),
    });
    ctx.state.modify_bobserver_schedule(|schedule| {
        schedule.current_shuffled_bobservers = shuffled;
        schedule.num_scheduled_bobservers = num_scheduled as u32;
        schedule.next_shuffle_block_num = head + num_scheduled as u32;
        schedule.majority_version = majority;
    })
}

/// Producer of the slot `slot` after the head block. Empty slots resolve to
/// the empty name.
pub fn get_scheduled_bobserver(state: &ChainState, slot: u32) -> ChainResult<AccountName> {
    let current_aslot = state.dynamic_global_properties()?.current_aslot + slot as u64;
    let schedule = state.bobserver_schedule()?;
    let num_scheduled = schedule.num_scheduled_bobservers.max(1) as u64;
    Ok(schedule
        .current_shuffled_bobservers
        .get((current_aslot % num_scheduled) as usize)
        .cloned()
        .unwrap_or_default())
}

/// Start of the slot `slot` after the head block, the epoch for slot 0.
///
/// Before the first block slots count from the genesis time, afterwards
/// from the head block slot.
pub fn get_slot_time(state: &ChainState, config: &ChainConfig, slot: u32) -> ChainResult<SigmaTime> {
    if slot == 0 {
        return Ok(SigmaTime::from_secs(0));
    }
    let interval = config.block_interval;
    let dgp = state.dynamic_global_properties()?;
    let head_slot_time = if dgp.head_block_number == 0 {
        dgp.time
    } else {
        SigmaTime::from_secs(dgp.time.to_secs() / interval * interval)
    };
    Ok(head_slot_time.saturating_add_secs(slot.saturating_mul(interval)))
}

/// Slot containing `when`, 0 when `when` precedes the first slot
pub fn get_slot_at_time(state: &ChainState, config: &ChainConfig, when: SigmaTime) -> ChainResult<u32> {
    let first_slot_time = get_slot_time(state, config, 1)?;
    if when < first_slot_time {
        return Ok(0);
    }
    Ok(when.saturating_sub(first_slot_time).to_secs() / config.block_interval + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<AccountName> {
        list.iter().map(|name| AccountName::new(*name)).collect()
    }

    #[test]
    fn test_shuffle_is_a_deterministic_permutation() {
        let original = names(&["bp1", "bp2", "bp3", "bp4", "bp5"]);
        let mut first = original.clone();
        let mut second = original.clone();
        shuffle(&mut first, SigmaTime::from_secs(1_600_000_000));
        shuffle(&mut second, SigmaTime::from_secs(1_600_000_000));
        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(sorted, original);
    }

    #[test]
    fn test_single_producer_is_unchanged() {
        let mut single = names(&["bp1"]);
        shuffle(&mut single, SigmaTime::from_secs(42));
        assert_eq!(single, names(&["bp1"]));
    }

    #[test]
    fn test_majority_counts_newer_versions() {
        let mut versions = BTreeMap::new();
        versions.insert(Reverse(Version::new(0, 2, 0)), 2);
        versions.insert(Reverse(Version::new(0, 1, 0)), 1);
        assert_eq!(majority_version(&versions, 2), Some(Version::new(0, 2, 0)));
        assert_eq!(majority_version(&versions, 3), Some(Version::new(0, 1, 0)));
        assert_eq!(majority_version(&versions, 4), None);
    }
}
