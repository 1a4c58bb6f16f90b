// Copyright (c) 2024 SIGMA ENGINE

use crate::chain::Chain;
use crate::controller::ChainControllerImpl;
use crate::manager::ChainManagerImpl;
use sigma_chain_exports::{ChainConfig, ChainController, ChainManager, ChainObserver, ChainResult};
use std::sync::Arc;
use tracing::info;

/// Creates the chain at its genesis state and returns its manager and a
/// controller to use it
///
/// # Arguments
/// * `config`: chain parameters
/// * `observers`: hooks called while blocks and transactions are applied, in order
pub fn start_chain_worker(
    config: ChainConfig,
    observers: Vec<Arc<dyn ChainObserver>>,
) -> ChainResult<(Box<dyn ChainManager>, Box<dyn ChainController>)> {
    let chain = Chain::new(config, observers)?;
    info!("chain {} started", chain.chain_id());
    let controller = ChainControllerImpl::new(chain);
    let manager = ChainManagerImpl {
        stopped: controller.stopped.clone(),
    };
    Ok((Box::new(manager), Box::new(controller)))
}
