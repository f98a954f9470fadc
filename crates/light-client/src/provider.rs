//! The state provider used by state sync.
//!
//! Built on the light client: app hashes and state snapshots are only ever
//! derived from headers that verified against the trust anchor.

use crate::client::LightClient;
use crate::source::{BlockSource, TrustOptions};
use crate::Result;
use ostracon_types::{ChainState, Commit, Hash};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Serves verified app hashes, commits, and [`ChainState`] snapshots for
/// state sync.
///
/// An app hash for height `h` is committed to by the header at `h + 1`, and
/// a full state at `h` additionally needs the validator sets announced at
/// `h + 1` and `h + 2`, so every call verifies one or two heights past the
/// one asked about.
pub struct StateProvider {
    chain_id: String,
    light: Mutex<LightClient>,
}

impl StateProvider {
    /// Create a state provider for `chain_id` over at least two sources.
    pub fn new(
        chain_id: impl Into<String>,
        sources: Vec<Arc<dyn BlockSource>>,
        trust: TrustOptions,
    ) -> Result<Self> {
        Ok(Self {
            chain_id: chain_id.into(),
            light: Mutex::new(LightClient::new(sources, trust)?),
        })
    }

    /// The application hash after executing height `height`.
    pub async fn app_hash(&self, height: i64) -> Result<Hash> {
        let mut light = self.light.lock().await;
        let next = light.verify_to_height(height + 1).await?;
        Ok(next.header.app_hash)
    }

    /// The verified commit certifying `height`.
    pub async fn commit(&self, height: i64) -> Result<Commit> {
        let mut light = self.light.lock().await;
        let block = light.verify_to_height(height).await?;
        Ok(block.commit.clone())
    }

    /// Build the [`ChainState`] at `height`, ready to hand to the
    /// consensus engine once the snapshot body is restored.
    pub async fn state(&self, height: i64) -> Result<ChainState> {
        info!("light: fetching and verifying state at height {height}");
        let mut light = self.light.lock().await;

        // The header at height carries what was decided there; the header
        // at height+1 commits to its results; height+2 announces the
        // validator set that follows.
        let last = light.verify_to_height(height).await?;
        let cur = light.verify_to_height(height + 1).await?;
        let next = light.verify_to_height(height + 2).await?;

        let consensus_params = light.consensus_params(height + 1).await?;

        Ok(ChainState {
            chain_id: self.chain_id.clone(),
            version: Default::default(),
            initial_height: 1,
            last_block_height: last.height(),
            last_block_id: last.commit.block_id.clone(),
            last_block_time: last.header.time,
            last_results_hash: cur.header.last_results_hash,
            app_hash: cur.header.app_hash,
            next_validators: next.validators.clone(),
            validators: cur.validators.clone(),
            last_validators: last.validators.clone(),
            last_height_validators_changed: next.height(),
            voters: cur.voters.clone(),
            consensus_params,
            last_height_consensus_params_changed: cur.height(),
        })
    }
}
