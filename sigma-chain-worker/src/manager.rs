// Copyright (c) 2024 SIGMA ENGINE

use sigma_chain_exports::ChainManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Chain manager: stops the chain shared by the controllers
pub struct ChainManagerImpl {
    pub(crate) stopped: Arc<AtomicBool>,
}

impl ChainManager for ChainManagerImpl {
    fn stop(&mut self) {
        if !self.stopped.swap(true, Ordering::AcqRel) {
            info!("chain stopped");
        }
    }
}
