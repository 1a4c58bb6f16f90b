// Copyright (c) 2024 SIGMA ENGINE
//! Single process node: starts the chain and produces the blocks of the
//! configured producer on its slots.
#![warn(unused_crate_dependencies)]

mod settings;

use crate::settings::{load_settings, Settings, BASE_CONFIG_PATH, OVERRIDE_CONFIG_PATH};
use anyhow::Context;
use clap::Parser;
use sigma_chain_exports::{ChainController, SkipFlags};
use sigma_chain_worker::start_chain_worker;
use sigma_models::AccountName;
use sigma_signature::PrivateKey;
use sigma_time::SigmaTime;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about = "Sigma engine node")]
struct Args {
    /// Base configuration file
    #[arg(long, default_value = BASE_CONFIG_PATH)]
    config: PathBuf,
    /// Configuration overriding the base one, read when present
    #[arg(long = "override", default_value = OVERRIDE_CONFIG_PATH)]
    override_config: PathBuf,
    /// Follow the chain without producing blocks
    #[arg(long)]
    no_production: bool,
    /// Stop once the head reaches this block number
    #[arg(long)]
    blocks: Option<u32>,
    /// Seed of the producer key, replaces the configured private key
    #[arg(long)]
    producer_seed: Option<String>,
}

/// Producer identity used to sign the blocks of this node
struct LocalProducer {
    name: AccountName,
    key: PrivateKey,
}

fn local_producer(settings: &Settings, args: &Args) -> anyhow::Result<Option<LocalProducer>> {
    if args.no_production || settings.producer.name.is_empty() {
        return Ok(None);
    }
    let key = if let Some(seed) = &args.producer_seed {
        PrivateKey::from_seed(seed)
    } else if settings.producer.private_key.is_empty() {
        warn!(
            "no private key for producer {}, using the development key derived from its name",
            settings.producer.name
        );
        PrivateKey::from_seed(&settings.producer.name)
    } else {
        PrivateKey::from_str(&settings.producer.private_key)
            .context("invalid producer private key")?
    };
    Ok(Some(LocalProducer {
        name: AccountName::new(&settings.producer.name),
        key,
    }))
}

/// Produces the block of `slot` if the local producer owns it
fn try_produce(
    controller: &dyn ChainController,
    producer: &LocalProducer,
    slot: u32,
) -> anyhow::Result<()> {
    let scheduled = controller.get_scheduled_bobserver(slot)?;
    if scheduled != producer.name {
        debug!("slot {} belongs to {}", slot, scheduled);
        return Ok(());
    }
    let when = controller.get_slot_time(slot)?;
    let block = controller.generate_block(
        when,
        producer.name.clone(),
        producer.key.clone(),
        SkipFlags::NOTHING,
    )?;
    info!(
        "produced block {} with {} transactions at {}",
        block.block_num(),
        block.transactions.len(),
        when
    );
    Ok(())
}

fn run(mut settings: Settings, args: &Args) -> anyhow::Result<()> {
    if settings.node.genesis_at_startup {
        settings.chain.genesis_time = SigmaTime::now()?;
    }
    let producer = local_producer(&settings, args)?;

    let (mut manager, controller) = start_chain_worker(settings.chain.clone(), Vec::new())?;
    let props = controller.get_dynamic_global_properties()?;
    info!(
        "chain {} at block {}, genesis {}",
        controller.chain_id(),
        props.head_block_number,
        settings.chain.genesis_time
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || stop_handler.store(true, Ordering::SeqCst))
        .context("cannot install the interrupt handler")?;

    info!(
        "checking production slots every {}",
        humantime::format_duration(settings.node.slot_poll_interval)
    );
    let mut last_slot_time = None;
    while !stop.load(Ordering::SeqCst) {
        if let Some(producer) = &producer {
            let now = SigmaTime::now()?;
            let slot = controller.get_slot_at_time(now)?;
            if slot > 0 {
                let slot_time = controller.get_slot_time(slot)?;
                if last_slot_time != Some(slot_time) {
                    last_slot_time = Some(slot_time);
                    if let Err(err) = try_produce(controller.as_ref(), producer, slot) {
                        warn!("could not produce the block of slot {}: {:#}", slot, err);
                    }
                }
            }
        }
        if let Some(target) = args.blocks {
            if controller.get_dynamic_global_properties()?.head_block_number >= target {
                info!("reached block {}", target);
                break;
            }
        }
        std::thread::sleep(settings.node.slot_poll_interval);
    }

    info!("stopping");
    manager.stop();
    let props = controller.get_dynamic_global_properties()?;
    info!(
        "stopped at block {}, last irreversible block {}",
        props.head_block_number, props.last_irreversible_block_num
    );
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let settings = load_settings(&args.config, &args.override_config)
        .with_context(|| format!("cannot load {}", args.config.display()))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.logging.filter))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    run(settings, &args)
}
