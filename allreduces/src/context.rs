//! Process-wide setup and teardown of an in-process world.

use crate::comm::Communicator;
use crate::config::AlConfig;
use crate::error::{AlError, Result};
use crate::types::Rank;
use futures::future::join_all;
use std::sync::Arc;

/// An initialized world: one communicator per rank, connected by a full
/// QUIC mesh on loopback.
///
/// Created once by [`Context::initialize`] and consumed by
/// [`Context::finalize`], so neither can run twice.
pub struct Context {
    comms: Vec<Arc<Communicator>>,
    config: AlConfig,
}

impl Context {
    /// Build a world of `world_size` ranks. Must be called inside a tokio
    /// runtime; the runtime must outlive the context.
    pub async fn initialize(world_size: u32, config: AlConfig) -> Result<Self> {
        let comms = Communicator::bootstrap_local(world_size, config.clone()).await?;
        tracing::info!(world_size, "context initialized");
        Ok(Self {
            comms: comms.into_iter().map(Arc::new).collect(),
            config,
        })
    }

    pub fn world_size(&self) -> u32 {
        self.comms.len() as u32
    }

    pub fn config(&self) -> &AlConfig {
        &self.config
    }

    /// All communicators, indexed by rank.
    pub fn communicators(&self) -> &[Arc<Communicator>] {
        &self.comms
    }

    pub fn communicator(&self, rank: Rank) -> Result<&Arc<Communicator>> {
        self.comms.get(rank as usize).ok_or(AlError::InvalidRank {
            rank,
            world_size: self.world_size(),
        })
    }

    /// Finalize every rank concurrently. Each rank's goodbye handshake needs
    /// its peers to be finalizing too, so they cannot run one after another.
    /// Returns the first failure after all ranks have finished.
    pub async fn finalize(self) -> Result<()> {
        let results = join_all(self.comms.iter().map(|c| c.finalize())).await;
        tracing::info!(world_size = self.world_size(), "context finalized");
        results.into_iter().collect()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("world_size", &self.world_size())
            .field("config", &self.config)
            .finish()
    }
}
